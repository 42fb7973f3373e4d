use serde::{Deserialize, Serialize};

/// Connection state of the single printer session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No session, no connection attempt in flight
    #[default]
    Disconnected,
    /// Transport open in flight
    Connecting,
    /// Channel open and writable
    Connected,
    /// Last connect attempt failed; settles to Disconnected
    Failed,
}

impl ConnectionState {
    /// Check if currently connected
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Transition to connecting state
    pub fn to_connecting(&self) -> Result<Self, &'static str> {
        match self {
            Self::Disconnected | Self::Failed => Ok(Self::Connecting),
            _ => Err("Can only connect from Disconnected or Failed state"),
        }
    }

    /// Transition to connected state
    pub fn to_connected(&self) -> Result<Self, &'static str> {
        match self {
            Self::Connecting => Ok(Self::Connected),
            _ => Err("Can only complete connection from Connecting state"),
        }
    }

    /// Transition to failed state
    pub fn to_failed(&self) -> Result<Self, &'static str> {
        match self {
            Self::Connecting => Ok(Self::Failed),
            _ => Err("Can only fail from Connecting state"),
        }
    }

    /// Transition to disconnected state
    pub fn to_disconnected(&self) -> Self {
        Self::Disconnected
    }

    /// Checked move to `next`
    pub fn advance_to(&self, next: Self) -> Result<Self, &'static str> {
        match next {
            Self::Connecting => self.to_connecting(),
            Self::Connected => self.to_connected(),
            Self::Failed => self.to_failed(),
            Self::Disconnected => Ok(self.to_disconnected()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_disconnected() {
        let state = ConnectionState::default();
        assert_eq!(state, ConnectionState::Disconnected);
        assert!(!state.is_connected());
    }

    #[test]
    fn test_happy_path() {
        let state = ConnectionState::Disconnected.to_connecting().unwrap();
        let state = state.to_connected().unwrap();
        assert!(state.is_connected());
        assert_eq!(state.to_disconnected(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_failure_path() {
        let state = ConnectionState::Connecting.to_failed().unwrap();
        assert_eq!(state, ConnectionState::Failed);
        assert_eq!(state.to_connecting(), Ok(ConnectionState::Connecting));
        assert_eq!(state.to_disconnected(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(ConnectionState::Connected.to_connecting().is_err());
        assert!(ConnectionState::Connecting.to_connecting().is_err());
        assert!(ConnectionState::Disconnected.to_connected().is_err());
        assert!(ConnectionState::Connected.to_failed().is_err());
    }

    #[test]
    fn test_advance_to_uses_checked_transitions() {
        use ConnectionState::*;

        assert_eq!(Disconnected.advance_to(Connecting), Ok(Connecting));
        assert_eq!(Connecting.advance_to(Connected), Ok(Connected));
        assert_eq!(Connecting.advance_to(Failed), Ok(Failed));
        assert_eq!(Connected.advance_to(Disconnected), Ok(Disconnected));

        assert!(Disconnected.advance_to(Connected).is_err());
        assert!(Connected.advance_to(Connecting).is_err());
        assert!(Disconnected.advance_to(Failed).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
    }
}
