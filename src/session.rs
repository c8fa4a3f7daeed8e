use alloc::{string::String, sync::Arc, vec::Vec};
use parking_lot::Mutex;
use tracing::debug;

use crate::{any::TypeInfo, errors::ResolveErrorKind, namespace::Namespace};

#[derive(Debug, Clone)]
pub(crate) struct Frame {
    pub(crate) feature: &'static str,
    pub(crate) group: String,
}

struct RecordedReference {
    namespace: Arc<Namespace>,
    name: String,
    expected: Option<TypeInfo>,
}

#[derive(Default)]
struct SessionInner {
    frames: Mutex<Vec<Frame>>,
    references: Mutex<Vec<RecordedReference>>,
}

/// State of one build: factories being invoked and references created on the way.
///
/// Each build owns its session, so concurrent builds don't see each other.
#[derive(Clone, Default)]
pub(crate) struct CompileSession {
    inner: Arc<SessionInner>,
}

/// Pops the frame on drop, also on early returns and unwinding
pub(crate) struct FrameGuard {
    session: CompileSession,
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        self.session.inner.frames.lock().pop();
    }
}

impl CompileSession {
    #[inline]
    #[must_use]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub(crate) fn enter(&self, frame: Frame) -> FrameGuard {
        self.inner.frames.lock().push(frame);
        FrameGuard { session: self.clone() }
    }

    #[must_use]
    pub(crate) fn current_frame(&self) -> Option<Frame> {
        self.inner.frames.lock().last().cloned()
    }

    pub(crate) fn record_reference(&self, namespace: Arc<Namespace>, name: impl Into<String>, expected: Option<TypeInfo>) {
        self.inner.references.lock().push(RecordedReference {
            namespace,
            name: name.into(),
            expected,
        });
    }

    /// Checks that every reference created during the build points to a defined service of the expected type
    pub(crate) fn validate(&self) -> Result<(), ResolveErrorKind> {
        let references = self.inner.references.lock();
        for RecordedReference { namespace, name, expected } in references.iter() {
            let Some(slot) = namespace.find(name) else {
                return Err(ResolveErrorKind::NoService { name: name.clone() });
            };
            if let Some(expected) = expected {
                if slot.provides() != *expected {
                    return Err(ResolveErrorKind::IncorrectType {
                        name: name.clone(),
                        expected: *expected,
                        actual: slot.provides(),
                    });
                }
            }
        }
        debug!(references = references.len(), "References validated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{CompileSession, Frame};
    use crate::{any::TypeInfo, definition::Definition, errors::ResolveErrorKind, namespace::Namespace};

    use alloc::{collections::BTreeMap, string::ToString as _, sync::Arc};

    #[test]
    fn test_frames_popped_on_drop() {
        let session = CompileSession::new();
        assert!(session.current_frame().is_none());

        {
            let _outer = session.enter(Frame {
                feature: "outer",
                group: "root".to_string(),
            });
            {
                let _inner = session.enter(Frame {
                    feature: "inner",
                    group: "root.merge-1".to_string(),
                });
                assert_eq!(session.current_frame().unwrap().feature, "inner");
            }
            assert_eq!(session.current_frame().unwrap().feature, "outer");
        }

        assert!(session.current_frame().is_none());
    }

    #[test]
    fn test_validate() {
        let namespace = Arc::new(Namespace::new("root", None));
        namespace.freeze(BTreeMap::from([("answer".to_string(), Definition::value(42u32).into_slot("answer"))]));

        let session = CompileSession::new();
        session.record_reference(namespace.clone(), "answer", Some(TypeInfo::of::<u32>()));
        session.record_reference(namespace.clone(), "answer", None);
        assert!(session.validate().is_ok());

        session.record_reference(namespace.clone(), "answer", Some(TypeInfo::of::<u8>()));
        assert!(matches!(session.validate(), Err(ResolveErrorKind::IncorrectType { .. })));

        let session = CompileSession::new();
        session.record_reference(namespace, "missing", None);
        assert!(matches!(session.validate(), Err(ResolveErrorKind::NoService { name }) if name == "missing"));
    }
}
