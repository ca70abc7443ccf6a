/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub total: usize,
    pub current: usize,
    pub answered: usize,
    pub remaining_secs: u32,
    pub is_finished: bool,
}
