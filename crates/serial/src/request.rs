use revkv_common::{
    DeleteOutcome, GetOutcome, ListOutcome, PutOutcome, Revision, RevisionsOutcome, StoreError,
};
use revkv_engine::{Handler, RevisionStore, dispatch};
use revkv_table::RevisionTable;

pub(crate) type BoxedHandler<O> = Box<dyn Handler<O> + Send>;

/// One queued operation plus the handler waiting for its outcome.
pub(crate) enum Request {
    Put {
        key: String,
        expected: Revision,
        body: Vec<u8>,
        handler: BoxedHandler<PutOutcome>,
    },
    Get {
        key: String,
        handler: BoxedHandler<GetOutcome>,
    },
    GetRevisions {
        key: String,
        handler: BoxedHandler<RevisionsOutcome>,
    },
    Delete {
        key: String,
        handler: BoxedHandler<DeleteOutcome>,
    },
    List {
        handler: BoxedHandler<ListOutcome>,
    },
    SetAutoPurge(bool),
}

impl Request {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Put { .. } => "put",
            Self::Get { .. } => "get",
            Self::GetRevisions { .. } => "get_revisions",
            Self::Delete { .. } => "delete",
            Self::List { .. } => "list",
            Self::SetAutoPurge(_) => "set_auto_purge",
        }
    }

    /// Run against the store and deliver the outcome.
    pub(crate) fn execute<T: RevisionTable>(self, store: &RevisionStore<T>) {
        match self {
            Self::Put {
                key,
                expected,
                body,
                mut handler,
            } => store.put_with(&key, expected, body, handler.as_mut()),
            Self::Get { key, mut handler } => store.get_with(&key, handler.as_mut()),
            Self::GetRevisions { key, mut handler } => {
                store.get_revisions_with(&key, handler.as_mut())
            }
            Self::Delete { key, mut handler } => store.delete_with(&key, handler.as_mut()),
            Self::List { mut handler } => store.list_with(handler.as_mut()),
            Self::SetAutoPurge(enabled) => store.set_auto_purge(enabled),
        }
    }

    /// Resolve without running, through the handler's `Failure` outcome.
    pub(crate) fn fail(self, error: StoreError) {
        match self {
            Self::Put { key, mut handler, .. } => {
                dispatch(PutOutcome::Failure { key, error }, handler.as_mut())
            }
            Self::Get { key, mut handler } => {
                dispatch(GetOutcome::Failure { key, error }, handler.as_mut())
            }
            Self::GetRevisions { key, mut handler } => {
                dispatch(RevisionsOutcome::Failure { key, error }, handler.as_mut())
            }
            Self::Delete { key, mut handler } => {
                dispatch(DeleteOutcome::Failure { key, error }, handler.as_mut())
            }
            Self::List { mut handler } => dispatch(ListOutcome::Failure { error }, handler.as_mut()),
            Self::SetAutoPurge(enabled) => {
                tracing::warn!(enabled, %error, "auto-purge change not applied");
            }
        }
    }
}
