/// Port for the user-facing status text and countdown display.
pub trait StatusView: Send + Sync {
    /// Replace the status text.
    fn show_status(&self, text: &str);

    /// Replace the "MM:SS" display.
    fn show_time(&self, label: &str);
}
