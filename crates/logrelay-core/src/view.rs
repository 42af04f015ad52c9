//! The page contract the core drives.
//!
//! A front end hides protected content until the auth check reveals it,
//! moves between the login page and the log page, and shows the text of
//! the log element.

/// Pages the flow can navigate to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// The sign-in form (`/login.html` on the web server)
    Login,
    /// The protected log page (`/view_logs`)
    ViewLogs,
}

impl Destination {
    pub fn path(&self) -> &'static str {
        match self {
            Destination::Login => "/login.html",
            Destination::ViewLogs => "/view_logs",
        }
    }
}

pub trait ViewBinding: Send + Sync {
    /// Drop the hidden marker so protected content becomes visible.
    fn reveal(&self);

    /// Leave the current page for `destination`.
    fn navigate(&self, destination: Destination);

    /// Replace the log element's text.
    fn render_log(&self, text: &str);
}
