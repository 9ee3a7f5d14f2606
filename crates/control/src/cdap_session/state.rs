/// Lifecycle of one CDAP session, layered over one N-1 flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CdapSessionState {
    /// No `M_CONNECT` exchanged yet.
    Null,
    /// `M_CONNECT` sent (or received), waiting for the paired response.
    AwaitingConnect,
    /// Connected; messages other than `M_CONNECT`/`M_RELEASE` may flow.
    Established,
    /// `M_RELEASE` sent (or received), waiting for the paired response.
    AwaitingRelease,
}

impl Default for CdapSessionState {
    fn default() -> Self {
        Self::Null
    }
}
