mod app;
mod model;
mod msg;
mod ops;

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use rand::Rng;
use rand::distributions::Alphanumeric;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use app::App;
use model::config::AppConfig;
use model::page::{
    ComparisonHeadings, ComparisonRow, FeatureCell, GridItem, LinkButton, Page, PanelRenderer,
    SidebarBody, SidebarBox, TabKind, UpgradeLink, stars,
};
use model::storage::StateStore;
use msg::Msg;
use ops::local::LocalStore;
use ops::registry::HttpRegistry;
use ops::{Capabilities, OpRequest, OpsService};

fn main() -> Result<()> {
    // Initialize logging to file (never stdout)
    let log_dir = directories::ProjectDirs::from("", "", "hearth")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| std::path::PathBuf::from("/tmp"));
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "hearth.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter("hearth=info")
        .init();

    tracing::info!("hearth starting");

    let config = AppConfig::load()?;

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run(&mut terminal, config);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("hearth error: {e:?}");
    }

    Ok(())
}

fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, config: AppConfig) -> Result<()> {
    let (tx, rx) = mpsc::channel::<Msg>();
    let (ops_tx, ops_rx) = mpsc::channel::<OpRequest>();

    let data_dir = config.data_dir().unwrap_or_else(|| PathBuf::from(".hearth"));
    let store = LocalStore::open(data_dir.clone())?;

    let page = build_page(&config);

    // Snapshot of the host facts the card states derive from; read fresh
    // at page build, before the store moves to the worker.
    let facts: HashMap<String, (bool, bool)> = page
        .plugin_slugs()
        .into_iter()
        .map(|slug| {
            let installed = store.is_installed(&slug);
            let active = store.is_active(&slug);
            (slug, (installed, active))
        })
        .collect();

    // One authorization nonce per page view, shared by client and handlers.
    let nonce: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(24)
        .map(char::from)
        .collect();

    let caps = Capabilities {
        install_plugins: config.capabilities.install_plugins,
        activate_plugins: config.capabilities.activate_plugins,
    };
    let registry = HttpRegistry::new(&config.registry.base_url);
    let service = OpsService::new(registry, store, caps, &nonce);
    spawn_ops_worker(service, ops_rx, tx.clone());

    let storage = StateStore::open(Some(data_dir), &page.instance_id);
    let mut app = App::new(
        page,
        |slug| facts.get(slug).copied().unwrap_or((false, false)),
        storage,
        &nonce,
        ops_tx,
    );

    // Input thread — reads terminal events and forwards as Msg
    let tx_input = tx.clone();
    thread::spawn(move || {
        loop {
            if let Ok(event) = event::read() {
                let msg = match event {
                    Event::Key(k) => Msg::Key(k),
                    Event::Resize(w, h) => Msg::Resize(w, h),
                    _ => continue,
                };
                if tx_input.send(msg).is_err() {
                    break;
                }
            }
        }
    });

    // Tick thread — 50ms periodic tick driving the panel reveal fade
    let tx_tick = tx.clone();
    thread::spawn(move || {
        loop {
            thread::sleep(Duration::from_millis(50));
            if tx_tick.send(Msg::Tick).is_err() {
                break;
            }
        }
    });

    // ── Main event loop ──
    loop {
        // Batch-drain all pending messages
        let first = rx.recv()?;
        app.update(first)?;

        while let Ok(msg) = rx.try_recv() {
            app.update(msg)?;
        }

        if app.should_quit {
            break;
        }

        terminal.draw(|f| app.view(f))?;
    }

    Ok(())
}

/// Worker thread owning the privileged operation handlers. Requests arrive
/// over their own channel; every outcome flows back into the main loop as a
/// message. One request is handled at a time, in arrival order.
fn spawn_ops_worker(
    service: OpsService<HttpRegistry>,
    requests: mpsc::Receiver<OpRequest>,
    tx: mpsc::Sender<Msg>,
) {
    thread::spawn(move || {
        for request in requests {
            let outcome = service.handle(&request);
            if tx.send(Msg::OpResponse(outcome)).is_err() {
                break;
            }
        }
    });
}

/// Sidebar box body listing the review stars for the product.
struct ReviewBox {
    product: String,
}

impl PanelRenderer for ReviewBox {
    fn render(&self) -> Vec<String> {
        vec![
            stars(),
            format!("Enjoying {}? A review helps a lot.", self.product),
        ]
    }
}

/// The embedding host's page definition. Everything the interaction engine
/// consumes — tabs, cards, links, hooks — is declared here once per run.
fn build_page(config: &AppConfig) -> Page {
    let name = config.general.product_name.clone();

    Page::new(
        &config.general.product_name,
        &config.general.product_version,
        &config.general.product_slug,
    )
    .set_notice(&format!("Welcome! {name} is now installed and ready to use."))
    .add_quick_link("Documentation", "https://hearth.dev/docs")
    .add_quick_link("Support", "https://hearth.dev/support")
    .add_tab(
        "general",
        "Getting Started",
        TabKind::Content {
            body: format!(
                "Thank you for installing **{name}**.\n\
                 \n\
                 Use the tabs above to explore what ships in the box:\n\
                 - **Features** gives an overview of the built-in tools.\n\
                 - **Plugins** installs recommended extensions with one key.\n\
                 - **Free vs Pro** compares the editions.\n\
                 \n\
                 Everything here works offline except plugin installation,\n\
                 which talks to the plugin registry."
            ),
        },
    )
    .add_tab(
        "features",
        "Features",
        TabKind::Grid {
            columns: 2,
            items: vec![
                GridItem {
                    title: "Content Library".to_string(),
                    description: "Organize drafts and published pieces in one place.".to_string(),
                    button: None,
                },
                GridItem {
                    title: "Scheduling".to_string(),
                    description: "Queue posts for automatic publication.".to_string(),
                    button: None,
                },
                GridItem {
                    title: "Revisions".to_string(),
                    description: "Every save keeps a restorable snapshot.".to_string(),
                    button: None,
                },
                GridItem {
                    title: "Themes".to_string(),
                    description: "Switch the look without touching content.".to_string(),
                    button: Some(LinkButton {
                        text: "Browse themes".to_string(),
                        url: "https://hearth.dev/themes".to_string(),
                    }),
                },
            ],
        },
    )
    .add_tab(
        "plugins",
        "Plugins",
        TabKind::Plugin {
            items: config
                .recommended
                .iter()
                .cloned()
                .map(Into::into)
                .collect(),
        },
    )
    .add_tab(
        "comparison",
        "Free vs Pro",
        TabKind::Comparison {
            headings: ComparisonHeadings::default(),
            rows: vec![
                ComparisonRow {
                    title: "Content library".to_string(),
                    description: "Drafts, revisions and scheduling.".to_string(),
                    free: FeatureCell::Yes,
                    pro: FeatureCell::Yes,
                },
                ComparisonRow {
                    title: "Sites".to_string(),
                    description: "Number of connected sites.".to_string(),
                    free: FeatureCell::Text("1".to_string()),
                    pro: FeatureCell::Text("Unlimited".to_string()),
                },
                ComparisonRow {
                    title: "Priority support".to_string(),
                    description: "Email support with a one-day turnaround.".to_string(),
                    free: FeatureCell::No,
                    pro: FeatureCell::Yes,
                },
            ],
            upgrade: Some(UpgradeLink {
                text: "Upgrade to Pro".to_string(),
                url: "https://hearth.dev/pro".to_string(),
            }),
        },
    )
    .add_sidebar_box(SidebarBox {
        title: "Leave a Review".to_string(),
        body: SidebarBody::Custom(Box::new(ReviewBox {
            product: name.clone(),
        })),
        button: Some(LinkButton {
            text: "Review".to_string(),
            url: "https://hearth.dev/review".to_string(),
        }),
    })
    .add_sidebar_box(SidebarBox {
        title: "Stay Updated".to_string(),
        body: SidebarBody::Content(
            "Release notes and tips, one short mail a month.".to_string(),
        ),
        button: Some(LinkButton {
            text: "Subscribe".to_string(),
            url: "https://hearth.dev/newsletter".to_string(),
        }),
    })
    .after_tab(Box::new(|_tab: &model::page::Tab| {
        vec!["Need help? The documentation covers every screen.".to_string()]
    }))
}
