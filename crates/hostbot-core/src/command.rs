/// Slash commands understood by the bot. Matching is exact and case-sensitive
/// after trimming surrounding whitespace.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Start,
    Status,
    Cpu,
    Ram,
    Hdd,
    Containers,
    Reboot,
    Shutdown,
}

impl Command {
    pub fn parse(text: &str) -> Option<Self> {
        let cmd = match text.trim() {
            "/start" => Self::Start,
            "/status" => Self::Status,
            "/cpu" => Self::Cpu,
            "/ram" => Self::Ram,
            "/hdd" => Self::Hdd,
            "/containers" => Self::Containers,
            "/reboot" => Self::Reboot,
            "/shutdown" => Self::Shutdown,
            _ => return None,
        };
        Some(cmd)
    }
}
