/*!
 * # Supabase persistence
 *
 * Stores annotations in a Supabase project:
 *
 * - rows in a PostgREST table (`polygons` by default), newest first by `created_at`
 * - images in a Storage bucket (`polygon-images` by default), served from the
 *   bucket's public URL
 *
 * Requests authenticate with the project's anon key and block until the response
 * arrives or the configured timeout expires.
 */

pub mod row;
pub mod service;

pub use row::{NewPolygonRow, PolygonRow, PolygonUpdate, RowError};
pub use service::SupabaseService;
