use super::core::WeakNavigator;
use crate::ids::TransitionId;
use crate::loader::RouteData;
use serde_json::Value;
use std::fmt;

/// A started navigation.
///
/// The target location is already current when a transition is handed out; settling
/// writes it to history. A transition settles when [`settle`](Self::settle) or
/// [`finish`](Self::finish) is called, or when it is dropped. Only the most recent
/// transition commits: one superseded by a later navigation is discarded.
pub struct Transition {
    id: TransitionId,
    navigator: WeakNavigator,
    target: String,
    state: Option<Value>,
    owned_len: usize,
    data: Vec<RouteData>,
    settled: bool,
}

impl Transition {
    pub(crate) fn new(
        id: TransitionId,
        navigator: WeakNavigator,
        target: String,
        state: Option<Value>,
        owned_len: usize,
        data: Vec<RouteData>,
    ) -> Self {
        Self {
            id,
            navigator,
            target,
            state,
            owned_len,
            data,
            settled: false,
        }
    }

    pub fn id(&self) -> TransitionId {
        self.id
    }

    /// The resolved path this transition navigates to.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Loader outcomes started by this transition, root route first.
    pub fn data(&self) -> &[RouteData] {
        &self.data
    }

    /// Commit to history now. Returns `false` if a later navigation superseded this one.
    pub fn settle(mut self) -> bool {
        self.settle_inner()
    }

    /// Wait for every route loader started by this transition, then settle.
    pub async fn finish(mut self) -> bool {
        futures::future::join_all(self.data.iter().cloned()).await;
        self.settle_inner()
    }

    fn settle_inner(&mut self) -> bool {
        if self.settled {
            return false;
        }
        self.settled = true;
        match self.navigator.upgrade() {
            Some(navigator) => {
                navigator.end_transition(self.id, self.owned_len, &self.target, &self.state)
            }
            None => false,
        }
    }
}

impl Drop for Transition {
    fn drop(&mut self) {
        self.settle_inner();
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("id", &self.id)
            .field("target", &self.target)
            .field("owned_len", &self.owned_len)
            .field("settled", &self.settled)
            .finish()
    }
}
