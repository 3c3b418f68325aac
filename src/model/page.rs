use crate::model::config::RecommendedPlugin;

/// Renderer capability for tabs and sidebar boxes with caller-defined bodies.
/// Implementations return plain text lines; styling is applied by the view.
pub trait PanelRenderer: Send {
    fn render(&self) -> Vec<String>;
}

/// Hook invoked around every tab body, in registration order. Returned lines
/// are shown before (or after) the tab content.
pub type TabHook = Box<dyn Fn(&Tab) -> Vec<String> + Send>;

/// A named content panel, selectable via the tab navigation.
pub struct Tab {
    pub id: String,
    pub title: String,
    pub kind: TabKind,
}

/// Closed set of tab body kinds. Every variant is matched exhaustively at
/// render time; there is no fallback branch.
pub enum TabKind {
    /// Paragraph text with inline emphasis markers.
    Content { body: String },
    /// Caller-supplied renderer.
    Custom { renderer: Box<dyn PanelRenderer> },
    /// Informational boxes laid out in columns.
    Grid { items: Vec<GridItem>, columns: usize },
    /// Plugin recommendation cards with install/activate buttons.
    Plugin { items: Vec<PluginDescriptor> },
    /// Free vs. pro feature table.
    Comparison {
        rows: Vec<ComparisonRow>,
        headings: ComparisonHeadings,
        upgrade: Option<UpgradeLink>,
    },
}

pub struct GridItem {
    pub title: String,
    pub description: String,
    pub button: Option<LinkButton>,
}

#[derive(Clone)]
pub struct LinkButton {
    pub text: String,
    pub url: String,
}

/// One installable extension shown as a card.
#[derive(Debug, Clone)]
pub struct PluginDescriptor {
    pub slug: String,
    pub name: String,
    pub description: String,
}

impl From<RecommendedPlugin> for PluginDescriptor {
    fn from(p: RecommendedPlugin) -> Self {
        Self {
            slug: p.slug,
            name: p.name,
            description: p.description,
        }
    }
}

pub struct ComparisonRow {
    pub title: String,
    pub description: String,
    pub free: FeatureCell,
    pub pro: FeatureCell,
}

/// A comparison table cell: availability marker or free-form text.
pub enum FeatureCell {
    Yes,
    No,
    Text(String),
}

pub struct ComparisonHeadings {
    pub free: String,
    pub pro: String,
}

impl Default for ComparisonHeadings {
    fn default() -> Self {
        Self {
            free: "Free".to_string(),
            pro: "Pro".to_string(),
        }
    }
}

pub struct UpgradeLink {
    pub text: String,
    pub url: String,
}

#[derive(Clone)]
pub struct QuickLink {
    pub text: String,
    pub url: String,
}

/// A box shown in the page sidebar.
pub struct SidebarBox {
    pub title: String,
    pub body: SidebarBody,
    pub button: Option<LinkButton>,
}

pub enum SidebarBody {
    Content(String),
    Custom(Box<dyn PanelRenderer>),
}

/// Full definition of a welcome page. Built once by the embedding host and
/// immutable for the page view; tab order is insertion order and the first
/// tab is the default-active one.
pub struct Page {
    pub product_name: String,
    pub product_version: String,
    /// Doubles as the storage instance prefix; injected by the host so two
    /// products on one machine never collide.
    pub instance_id: String,
    pub title: String,
    pub subtitle: String,
    pub notice: Option<String>,
    pub quick_links: Vec<QuickLink>,
    pub tabs: Vec<Tab>,
    pub sidebar: Vec<SidebarBox>,
    pub before_tab_hooks: Vec<TabHook>,
    pub after_tab_hooks: Vec<TabHook>,
}

impl Page {
    pub fn new(name: &str, version: &str, slug: &str) -> Self {
        let instance_id = slug.to_lowercase().replace('_', "-");
        Self {
            product_name: name.to_string(),
            product_version: version.to_string(),
            instance_id,
            title: format!("Welcome to {name} - {version}"),
            subtitle: format!("{name} is now installed and ready to use. Thank you for choosing {name}, cheers!"),
            notice: None,
            quick_links: Vec::new(),
            tabs: Vec::new(),
            sidebar: Vec::new(),
            before_tab_hooks: Vec::new(),
            after_tab_hooks: Vec::new(),
        }
    }

    pub fn set_title(mut self, title: &str, subtitle: &str) -> Self {
        self.title = title.to_string();
        self.subtitle = subtitle.to_string();
        self
    }

    pub fn set_notice(mut self, message: &str) -> Self {
        self.notice = Some(message.to_string());
        self
    }

    pub fn add_quick_link(mut self, text: &str, url: &str) -> Self {
        self.quick_links.push(QuickLink {
            text: text.to_string(),
            url: url.to_string(),
        });
        self
    }

    pub fn add_tab(mut self, id: &str, title: &str, kind: TabKind) -> Self {
        self.tabs.push(Tab {
            id: id.to_string(),
            title: title.to_string(),
            kind,
        });
        self
    }

    pub fn add_sidebar_box(mut self, sidebar_box: SidebarBox) -> Self {
        self.sidebar.push(sidebar_box);
        self
    }

    pub fn before_tab(mut self, hook: TabHook) -> Self {
        self.before_tab_hooks.push(hook);
        self
    }

    pub fn after_tab(mut self, hook: TabHook) -> Self {
        self.after_tab_hooks.push(hook);
        self
    }

    pub fn tab_index(&self, id: &str) -> Option<usize> {
        self.tabs.iter().position(|tab| tab.id == id)
    }

    /// Slugs of every plugin card on the page, in tab order.
    pub fn plugin_slugs(&self) -> Vec<String> {
        self.tabs
            .iter()
            .filter_map(|tab| match &tab.kind {
                TabKind::Plugin { items } => Some(items.iter().map(|i| i.slug.clone())),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

/// Title-case a slug: "night-mode" → "Night Mode".
pub fn title_from_slug(slug: &str) -> String {
    slug.split('-')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Five-star review line for sidebar boxes.
pub fn stars() -> String {
    "★★★★★".to_string()
}
