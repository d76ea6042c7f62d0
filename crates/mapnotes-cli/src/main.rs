mod import;

use anyhow::{Context, Result, anyhow, bail};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use mapnotes_config::Config;
use mapnotes_engine::{
    AnnotationMetadata, AnnotationService, BasemapStyle, Color as AnnotationColor, Container,
    FILL_LAYER, HeadlessEngine, HeadlessProbe, MapWorkspace, MemoryService,
};
use mapnotes_supabase::SupabaseService;
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};
use std::{env, io::stdout, path::PathBuf, process};

type Workspace = MapWorkspace<Box<dyn AnnotationService>>;

/// Command-line options
#[derive(Debug, Default, PartialEq)]
struct Args {
    import: Option<PathBuf>,
    name: Option<String>,
    color: Option<String>,
    image: Option<PathBuf>,
}

impl Args {
    fn parse(args: &[String]) -> Result<Self> {
        let mut parsed = Args::default();
        let mut iter = args.iter();
        while let Some(flag) = iter.next() {
            let mut value = || {
                iter.next()
                    .cloned()
                    .ok_or_else(|| anyhow!("{flag} needs a value"))
            };
            match flag.as_str() {
                "--import" => parsed.import = Some(PathBuf::from(value()?)),
                "--name" => parsed.name = Some(value()?),
                "--color" => parsed.color = Some(value()?),
                "--image" => parsed.image = Some(PathBuf::from(value()?)),
                other => bail!("unknown argument {other}"),
            }
        }
        if parsed.import.is_none()
            && (parsed.name.is_some() || parsed.color.is_some() || parsed.image.is_some())
        {
            bail!("--name, --color and --image only apply to --import");
        }
        if parsed.import.is_some() && parsed.name.is_none() {
            bail!("--import needs --name");
        }
        Ok(parsed)
    }
}

/// The workspace runs on the headless engine; the probe stands in for the map's
/// own event loop.
struct Session {
    workspace: Workspace,
    probe: HeadlessProbe,
}

impl Session {
    fn open(config: &Config) -> Result<Self> {
        let service: Box<dyn AnnotationService> = match &config.persistence {
            Some(persistence) => Box::new(SupabaseService::new(persistence)?),
            None => {
                log::warn!("No [persistence] configured, annotations last for this session only");
                Box::new(MemoryService::new())
            }
        };

        let (engine, probe) = HeadlessEngine::new();
        let mut workspace = MapWorkspace::new(engine, service)
            .with_layers(config.layer_registry()?)
            .with_styles(config.styles.catalog());

        if !workspace.attach(Some(&Container::new("terminal")), config.map.style) {
            bail!("Could not create the map surface");
        }
        let mut session = Self { workspace, probe };
        session.settle();
        session.workspace.load()?;
        Ok(session)
    }

    /// Let pending style loads finish and handle whatever the engine queued.
    fn settle(&mut self) -> Vec<String> {
        self.probe.finish_style_load();
        self.workspace
            .pump()
            .into_iter()
            .map(|e| e.to_string())
            .collect()
    }

    fn import(&mut self, args: &Args) -> Result<()> {
        let (Some(path), Some(name)) = (&args.import, &args.name) else {
            bail!("--import needs --name");
        };
        let geometry = import::read_polygon(path)?;

        self.probe.start_draw();
        self.probe.draw(geometry);
        if let Some(error) = self.workspace.pump().into_iter().next() {
            return Err(error.into());
        }

        let mut metadata = AnnotationMetadata::named(name.as_str());
        if let Some(color) = &args.color {
            metadata = metadata.with_color(AnnotationColor::parse(color)?);
        }
        if let Some(image) = &args.image {
            let bytes = std::fs::read(image)
                .with_context(|| format!("Failed to read image {}", image.display()))?;
            let file_name = image
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "image".to_string());
            metadata = metadata.with_image(file_name, bytes);
        }

        let id = self.workspace.confirm_pending(metadata)?;
        if let Some(annotation) = self.workspace.store().get(&id) {
            println!(
                "Created {} \"{}\" ({:.2} sq. meters)",
                id,
                annotation.name(),
                annotation.area()
            );
        }
        Ok(())
    }
}

struct App {
    session: Session,
    list_state: ListState,
    details: Vec<String>,
    status: String,
}

impl App {
    fn new(session: Session) -> Self {
        let mut app = Self {
            session,
            list_state: ListState::default(),
            details: Vec::new(),
            status: String::new(),
        };
        if !app.session.workspace.store().is_empty() {
            app.list_state.select(Some(0));
        }
        app.status = format!(
            "{} annotations | style: {}",
            app.session.workspace.store().len(),
            app.session.workspace.style()
        );
        app
    }

    fn next(&mut self) {
        let len = self.session.workspace.store().len();
        if len == 0 {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) => (i + 1) % len,
            None => 0,
        };
        self.list_state.select(Some(i));
        self.details.clear();
    }

    fn previous(&mut self) {
        let len = self.session.workspace.store().len();
        if len == 0 {
            return;
        }
        let i = match self.list_state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.list_state.select(Some(i));
        self.details.clear();
    }

    /// Click the selected annotation on the map and show the popup it opens.
    fn open_popup(&mut self) {
        let Some(annotation) = self
            .list_state
            .selected()
            .and_then(|i| self.session.workspace.store().list().get(i))
        else {
            return;
        };
        let at = annotation.boundary().centroid();
        let name = annotation.name().to_string();

        let before = self.session.probe.popups().len();
        if !self.session.probe.click(FILL_LAYER, at) {
            self.status = format!("\"{name}\" is not clickable at its centroid");
            return;
        }
        self.session.workspace.pump();

        let popups = self.session.probe.popups();
        match popups.get(before..).and_then(|new| new.last()) {
            Some(popup) => self.details = import::popup_lines(&popup.html),
            None => self.status = format!("No popup opened for \"{name}\""),
        }
    }

    fn next_style(&mut self) {
        let style: BasemapStyle = self.session.workspace.style().next();
        match self.session.workspace.set_style(style) {
            Ok(()) => {
                let errors = self.session.settle();
                self.status = match errors.first() {
                    Some(e) => format!("Style {style}: {e}"),
                    None => format!("Style: {style}"),
                };
            }
            Err(e) => self.status = format!("Could not switch style: {e}"),
        }
    }

    fn toggle_layer(&mut self, number: usize) {
        let Some(id) = self
            .session
            .workspace
            .layers()
            .iter()
            .nth(number.saturating_sub(1))
            .map(|layer| layer.id.clone())
        else {
            return;
        };
        self.status = match self.session.workspace.toggle_layer(&id) {
            Ok(true) => format!("{id} shown"),
            Ok(false) => format!("{id} hidden"),
            Err(e) => e.to_string(),
        };
    }

    fn delete_selected(&mut self) {
        let Some(id) = self
            .list_state
            .selected()
            .and_then(|i| self.session.workspace.store().list().get(i))
            .map(|a| a.id().clone())
        else {
            return;
        };
        match self.session.workspace.delete(&id) {
            Ok(()) => {
                self.status = format!("Deleted {id}");
                self.details.clear();
                let len = self.session.workspace.store().len();
                self.list_state
                    .select(self.list_state.selected().filter(|_| len > 0).map(|i| i.min(len - 1)));
            }
            Err(e) => self.status = format!("Delete failed: {e}"),
        }
    }
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let parsed = match Args::parse(&args[1..]) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!(
                "Usage: {} [--import <file.geojson> --name <name> [--color <hex>] [--image <file>]]",
                args[0]
            );
            process::exit(1);
        }
    };

    // The TUI owns the terminal, so it only logs when RUST_LOG asks for it
    let default_level = if parsed.import.is_some() {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Off
    };
    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .init();

    let config = match Config::load() {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => {
            eprintln!("Error: Failed to load config file: {e}");
            process::exit(1);
        }
    };

    let mut session = Session::open(&config)?;
    if parsed.import.is_some() {
        return session.import(&parsed);
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(session);
    let res = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("{err:?}");
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()>
where
    B::Error: Send + Sync + 'static,
{
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') => return Ok(()),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::Enter => app.open_popup(),
                KeyCode::Char('s') => app.next_style(),
                KeyCode::Char('x') => app.delete_selected(),
                KeyCode::Char(c @ '1'..='9') => {
                    if let Some(n) = c.to_digit(10) {
                        app.toggle_layer(n as usize);
                    }
                }
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)].as_ref())
        .split(f.area());
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .margin(1)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)].as_ref())
        .split(rows[0]);
    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(7)].as_ref())
        .split(columns[1]);

    let workspace = &app.session.workspace;

    // Annotation list panel
    let items: Vec<ListItem> = workspace
        .store()
        .list()
        .iter()
        .map(|annotation| {
            ListItem::new(vec![Line::from(vec![
                Span::styled("■ ", Style::default().fg(swatch(annotation.color().as_str()))),
                Span::raw(format!(
                    "{}  ({:.3} km²)",
                    annotation.name(),
                    annotation.area() / 1_000_000.0
                )),
            ])])
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Annotations"))
        .highlight_style(Style::default().bg(Color::Yellow).fg(Color::Black));

    f.render_stateful_widget(list, columns[0], &mut app.list_state);

    // Popup panel
    let details: Vec<Line> = if app.details.is_empty() {
        vec![Line::from("Press Enter to open the selected annotation")]
    } else {
        app.details
            .iter()
            .map(|line| Line::from(vec![Span::raw(line.clone())]))
            .collect()
    };
    let popup = Paragraph::new(details)
        .block(Block::default().borders(Borders::ALL).title("Popup"))
        .wrap(ratatui::widgets::Wrap { trim: true });
    f.render_widget(popup, side[0]);

    // Layer panel
    let layers: Vec<Line> = workspace
        .layers()
        .iter()
        .enumerate()
        .map(|(i, layer)| {
            let mark = if layer.visible { "x" } else { " " };
            Line::from(format!(
                "{}: [{mark}] {} ({})",
                i + 1,
                layer.label,
                layer.features.len()
            ))
        })
        .collect();
    let title = format!("Layers | {}", workspace.style());
    let layer_panel =
        Paragraph::new(layers).block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(layer_panel, side[1]);

    // Instructions
    let help_text = Line::from(vec![
        Span::raw("q: Quit | "),
        Span::raw("↑/k ↓/j: Select | "),
        Span::raw("Enter: Popup | s: Style | 1-9: Layer | x: Delete"),
        Span::raw(if app.status.is_empty() { "" } else { " | " }),
        Span::raw(app.status.clone()),
    ]);
    let help = Paragraph::new(vec![help_text]).block(Block::default());
    f.render_widget(help, rows[1]);
}

/// Terminal color for a `#rrggbb` annotation color
fn swatch(hex: &str) -> Color {
    let digits = hex.trim_start_matches('#');
    let channel = |i: usize| {
        digits
            .get(i..i + 2)
            .and_then(|c| u8::from_str_radix(c, 16).ok())
    };
    match (channel(0), channel(2), channel(4)) {
        (Some(r), Some(g), Some(b)) => Color::Rgb(r, g, b),
        _ => Color::White,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn test_no_arguments_opens_tui() {
        assert_eq!(Args::parse(&[]).unwrap(), Args::default());
    }

    #[test]
    fn test_import_arguments() {
        let args = Args::parse(&strings(&[
            "--import", "zone.geojson", "--name", "Zone A", "--color", "#dc2626",
        ]))
        .unwrap();
        assert_eq!(args.import, Some(PathBuf::from("zone.geojson")));
        assert_eq!(args.name.as_deref(), Some("Zone A"));
        assert_eq!(args.color.as_deref(), Some("#dc2626"));
    }

    #[test]
    fn test_invalid_arguments() {
        assert!(Args::parse(&strings(&["--import", "zone.geojson"])).is_err());
        assert!(Args::parse(&strings(&["--name", "Zone A"])).is_err());
        assert!(Args::parse(&strings(&["--import"])).is_err());
        assert!(Args::parse(&strings(&["--verbose"])).is_err());
    }

    #[test]
    fn test_swatch() {
        assert_eq!(swatch("#dc2626"), Color::Rgb(0xdc, 0x26, 0x26));
        assert_eq!(swatch("#abc"), Color::White);
    }

    #[test]
    fn test_import_through_session() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("zone.geojson");
        std::fs::write(
            &path,
            r#"{"type":"Polygon","coordinates":[[[0,0],[0.01,0],[0.01,0.01],[0,0.01],[0,0]]]}"#,
        )
        .unwrap();

        let mut session = Session::open(&Config::default()).unwrap();
        let args = Args {
            import: Some(path),
            name: Some("Zone A".to_string()),
            color: Some("#dc2626".to_string()),
            image: None,
        };
        session.import(&args).unwrap();

        let store = session.workspace.store();
        assert_eq!(store.len(), 1);
        assert_eq!(store.list()[0].name(), "Zone A");
    }

    #[test]
    fn test_app_popup_and_style_cycle() {
        let mut session = Session::open(&Config::default()).unwrap();
        session.probe.start_draw();
        session.probe.draw(mapnotes_engine::Geometry::Polygon(vec![vec![
            [0.0, 0.0],
            [0.01, 0.0],
            [0.01, 0.01],
            [0.0, 0.01],
            [0.0, 0.0],
        ]]));
        session.workspace.pump();
        session
            .workspace
            .confirm_pending(AnnotationMetadata::named("Zone A"))
            .unwrap();

        let mut app = App::new(session);
        app.open_popup();
        assert_eq!(app.details.first().map(String::as_str), Some("Zone A"));

        app.next_style();
        assert_eq!(app.session.workspace.style(), BasemapStyle::Satellite);
        assert_eq!(app.status, "Style: satellite");

        app.toggle_layer(1);
        assert_eq!(app.status, "hospitals hidden");

        app.delete_selected();
        assert!(app.session.workspace.store().is_empty());
        assert_eq!(app.list_state.selected(), None);
    }
}
