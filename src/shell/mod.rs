//! Seams to the display shell and the modal dialog host, plus the input
//! vocabulary shells feed into the controller.

use futures::future::BoxFuture;
use serde::Serialize;

use crate::error::{ChallengeError, ShellError};
use crate::playlist::Project;
use crate::sequencer::NavCommand;

pub mod browser;
pub mod headless;
#[cfg(feature = "window")]
pub mod texture_loader;
#[cfg(feature = "window")]
pub mod window;

/// Everything the title card shows for one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardData {
    pub title: String,
    pub author: String,
    pub background_color: String,
    pub background_image: Option<String>,
    pub index: usize,
    pub total: usize,
}

impl CardData {
    pub fn new(project: &Project, index: usize, total: usize, background_color: &str, background_image: Option<&str>) -> Self {
        Self {
            title: project.title.clone(),
            author: project.author.clone(),
            background_color: background_color.to_string(),
            background_image: background_image.map(str::to_string),
            index,
            total,
        }
    }
}

/// The fullscreen surface. Loads run concurrently with the controller; their
/// results come back as completions.
pub trait DisplayShell: Send + Sync + 'static {
    /// Shows the title card surface. Resolves once it is ready to receive card data.
    fn load_interstitial(&self) -> BoxFuture<'static, Result<(), ShellError>>;

    /// Replaces whatever is on screen with the project at `url`.
    fn load_content(&self, url: &str) -> BoxFuture<'static, Result<(), ShellError>>;

    /// Updates the visible card without reloading it.
    fn send_card_data(&self, card: &CardData);

    /// Releases anything the shell spawned. Called once on shutdown.
    fn close(&self) {}
}

pub trait DialogHost: Send + Sync + 'static {
    /// Resolves with the entered text, or `Cancelled` when dismissed.
    fn present_password_challenge(&self) -> BoxFuture<'static, Result<String, ChallengeError>>;
}

/// What shells report to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Navigate(NavCommand),
    /// Key press, pointer motion, scroll or gesture.
    Activity,
    PointerDown,
    PointerUp,
    FocusLost,
    /// The user (or the window manager) asked the process to exit.
    Quit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn card_encodes_with_camel_case_keys() {
        let project = Project::new("Waves", "Ada", "https://a.example");
        let card = CardData::new(&project, 2, 5, "#202020", None);
        assert_eq!(
            serde_json::to_value(&card).unwrap(),
            json!({
                "title": "Waves",
                "author": "Ada",
                "backgroundColor": "#202020",
                "backgroundImage": null,
                "index": 2,
                "total": 5,
            })
        );
    }
}
