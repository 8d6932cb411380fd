//! ## meshload-core::model
//! **Command tree executed by a simulated service**
//!
//! A service's behaviour per invocation is a [`Script`]: an ordered list of
//! [`Command`]s. A command either suspends the current path ([`SleepCommand`]),
//! calls another service ([`RequestCommand`]) or fans out into parallel
//! sub-commands ([`ConcurrentCommand`]), which may nest arbitrarily.
//!
//! The tree is built once from a topology and only ever read afterwards, so a
//! single script can back any number of simultaneous invocations.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while constructing model values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("probability {0} is outside of [0, 100]")]
    ProbabilityOutOfRange(u32),
}

/// Percent chance that a request is actually sent.
///
/// `0` is a sentinel for "always send", not "never send". Every other value
/// `p` sends the request roughly `p` times out of 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Probability(u8);

impl Probability {
    /// The unset probability. Requests carrying it are never skipped.
    pub const ALWAYS: Probability = Probability(0);

    pub fn new(percent: u32) -> Result<Self, ModelError> {
        if percent > 100 {
            return Err(ModelError::ProbabilityOutOfRange(percent));
        }
        Ok(Self(percent as u8))
    }

    #[inline]
    pub fn percent(self) -> u8 {
        self.0
    }

    #[inline]
    pub fn is_always(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Probability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Suspends the executing path for a fixed duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepCommand(pub Duration);

impl SleepCommand {
    pub fn duration(&self) -> Duration {
        self.0
    }
}

/// Sends `size` bytes to `destination`, subject to `probability`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestCommand {
    pub destination: String,
    pub size: u64,
    pub probability: Probability,
}

impl RequestCommand {
    /// Creates a request that is always sent.
    pub fn new(destination: impl Into<String>, size: u64) -> Self {
        Self {
            destination: destination.into(),
            size,
            probability: Probability::ALWAYS,
        }
    }

    pub fn with_probability(mut self, probability: Probability) -> Self {
        self.probability = probability;
        self
    }
}

/// Sub-commands that run in parallel with each other.
///
/// The parent path resumes only after every sub-command finished. Clones
/// share the sub-commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcurrentCommand(Arc<[Command]>);

impl ConcurrentCommand {
    pub fn new(commands: Vec<Command>) -> Self {
        Self(commands.into())
    }

    pub fn commands(&self) -> &[Command] {
        &self.0
    }

    /// Handle on the sub-commands that can move into a spawned branch.
    pub fn shared(&self) -> Arc<[Command]> {
        Arc::clone(&self.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One node of the execution tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Sleep(SleepCommand),
    Request(RequestCommand),
    Concurrent(ConcurrentCommand),
}

impl Command {
    pub fn sleep(duration: Duration) -> Self {
        Command::Sleep(SleepCommand(duration))
    }

    pub fn request(destination: impl Into<String>, size: u64, probability: Probability) -> Self {
        Command::Request(RequestCommand::new(destination, size).with_probability(probability))
    }

    pub fn concurrent(commands: impl IntoIterator<Item = Command>) -> Self {
        Command::Concurrent(ConcurrentCommand(commands.into_iter().collect()))
    }

    /// Visits every request reachable from this command, depth first.
    pub fn for_each_request<'a>(&'a self, f: &mut impl FnMut(&'a RequestCommand)) {
        match self {
            Command::Sleep(_) => {}
            Command::Request(request) => f(request),
            Command::Concurrent(group) => {
                for command in group.commands() {
                    command.for_each_request(f);
                }
            }
        }
    }
}

impl From<SleepCommand> for Command {
    fn from(cmd: SleepCommand) -> Self {
        Command::Sleep(cmd)
    }
}

impl From<RequestCommand> for Command {
    fn from(cmd: RequestCommand) -> Self {
        Command::Request(cmd)
    }
}

impl From<ConcurrentCommand> for Command {
    fn from(cmd: ConcurrentCommand) -> Self {
        Command::Concurrent(cmd)
    }
}

/// Ordered sequence of commands executed strictly one after the other.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Script(Vec<Command>);

impl Script {
    pub fn new(commands: Vec<Command>) -> Self {
        Self(commands)
    }

    pub fn commands(&self) -> &[Command] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Command> {
        self.0.iter()
    }

    /// All requests in the script, in declaration order.
    pub fn requests(&self) -> Vec<&RequestCommand> {
        let mut requests = Vec::new();
        for command in &self.0 {
            command.for_each_request(&mut |request| requests.push(request));
        }
        requests
    }
}

impl From<Vec<Command>> for Script {
    fn from(commands: Vec<Command>) -> Self {
        Self(commands)
    }
}

impl FromIterator<Command> for Script {
    fn from_iter<I: IntoIterator<Item = Command>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Script {
    type Item = &'a Command;
    type IntoIter = std::slice::Iter<'a, Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probability_rejects_values_above_hundred() {
        assert_eq!(Probability::new(100).unwrap().percent(), 100);
        assert_eq!(
            Probability::new(101),
            Err(ModelError::ProbabilityOutOfRange(101))
        );
    }

    #[test]
    fn zero_probability_is_the_always_sentinel() {
        assert!(Probability::new(0).unwrap().is_always());
        assert!(Probability::default().is_always());
        assert!(!Probability::new(1).unwrap().is_always());
    }

    #[test]
    fn requests_are_collected_through_nested_groups() {
        let script = Script::new(vec![
            Command::request("a", 1, Probability::ALWAYS),
            Command::sleep(Duration::from_millis(5)),
            Command::concurrent([
                Command::request("b", 2, Probability::ALWAYS),
                Command::concurrent([Command::request("c", 3, Probability::ALWAYS)]),
            ]),
        ]);

        let names: Vec<_> = script
            .requests()
            .into_iter()
            .map(|r| r.destination.as_str())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn cloned_groups_share_their_sub_commands() {
        let group = ConcurrentCommand::new(vec![Command::request("a", 1, Probability::ALWAYS)]);
        let copy = group.clone();
        assert!(Arc::ptr_eq(&group.shared(), &copy.shared()));
        assert_eq!(group, copy);
    }
}
