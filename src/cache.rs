use alloc::{collections::BTreeMap, string::String, sync::Arc};
use core::{
    num::NonZeroUsize,
    sync::atomic::{AtomicBool, Ordering},
};
use parking_lot::{const_mutex, lock_api::GetThreadId as _, Condvar, Mutex, RawThreadId, RwLock};
use tracing::{debug, debug_span, error};

use crate::{
    any::{RcAny, TypeInfo},
    config::Config,
    errors::{InstantiateErrorKind, InstantiatorErrorKind, ResolveErrorKind},
};

pub(crate) type BoxedServiceFactory = Arc<dyn Fn() -> Result<RcAny, InstantiateErrorKind> + Send + Sync>;

enum SlotState {
    Pending,
    Resolving { owner: NonZeroUsize },
    Resolved(RcAny),
}

struct Wait {
    slot: usize,
    owner: NonZeroUsize,
}

/// Threads blocked on a slot another thread is evaluating, keyed by the waiting thread
static WAITS: Mutex<BTreeMap<NonZeroUsize, Wait>> = const_mutex(BTreeMap::new());

#[inline]
fn current_thread() -> NonZeroUsize {
    RawThreadId::INIT.nonzero_thread_id()
}

/// Records that `waiter` blocks on `slot` owned by `owner`.
/// Returns `false` without recording if `owner` already waits on `waiter`, directly or through other threads.
fn start_waiting(waiter: NonZeroUsize, slot: usize, owner: NonZeroUsize) -> bool {
    let mut waits = WAITS.lock();
    let mut next = Some(owner);
    while let Some(thread) = next {
        if thread == waiter {
            return false;
        }
        next = waits.get(&thread).map(|wait| wait.owner);
    }
    waits.insert(waiter, Wait { slot, owner });
    true
}

#[inline]
fn stop_waiting(waiter: NonZeroUsize) {
    WAITS.lock().remove(&waiter);
}

#[inline]
fn release_waiters(slot: usize) {
    WAITS.lock().retain(|_, wait| wait.slot != slot);
}

/// Lazily evaluated service.
///
/// The factory runs without the slot lock held. Other threads asking for the slot
/// meanwhile wait for the value, unless the evaluating thread is itself waiting on them:
/// that's a cycle and the waiter gets [`ResolveErrorKind::CircularResolution`].
pub(crate) struct ServiceSlot {
    name: RwLock<String>,
    bound: AtomicBool,
    provides: TypeInfo,
    config: Config,
    factory: Option<BoxedServiceFactory>,
    state: Mutex<SlotState>,
    settled: Condvar,
}

/// Puts the slot back to pending if the factory unwinds
struct Evaluation<'a> {
    slot: &'a ServiceSlot,
    finished: bool,
}

impl Evaluation<'_> {
    fn finish(mut self, state: SlotState) {
        self.finished = true;
        self.slot.settle(state);
    }
}

impl Drop for Evaluation<'_> {
    fn drop(&mut self) {
        if !self.finished {
            error!(service = %self.slot.name(), "Factory panicked");
            self.slot.settle(SlotState::Pending);
        }
    }
}

impl ServiceSlot {
    fn with_state(
        name: String,
        bound: bool,
        provides: TypeInfo,
        config: Config,
        factory: Option<BoxedServiceFactory>,
        state: SlotState,
    ) -> Self {
        Self {
            name: RwLock::new(name),
            bound: AtomicBool::new(bound),
            provides,
            config,
            factory,
            state: Mutex::new(state),
            settled: Condvar::new(),
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn new(name: impl Into<String>, provides: TypeInfo, config: Config, factory: BoxedServiceFactory) -> Self {
        Self::with_state(name.into(), true, provides, config, Some(factory), SlotState::Pending)
    }

    /// Slot named after its type until the first [`Self::bind`]
    #[inline]
    #[must_use]
    pub(crate) fn unbound(provides: TypeInfo, config: Config, factory: BoxedServiceFactory) -> Self {
        Self::with_state(provides.short_name().into(), false, provides, config, Some(factory), SlotState::Pending)
    }

    #[inline]
    #[must_use]
    pub(crate) fn resolved(name: impl Into<String>, provides: TypeInfo, value: RcAny) -> Self {
        Self::with_state(name.into(), true, provides, Config::default(), None, SlotState::Resolved(value))
    }

    /// Names the slot after the first service it's bound to
    pub(crate) fn bind(&self, name: &str) {
        if self
            .bound
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            *self.name.write() = name.into();
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn name(&self) -> String {
        self.name.read().clone()
    }

    #[inline]
    #[must_use]
    pub(crate) const fn provides(&self) -> TypeInfo {
        self.provides
    }

    #[inline]
    fn key(&self) -> usize {
        self as *const Self as usize
    }

    fn circular(&self) -> ResolveErrorKind {
        let err = ResolveErrorKind::CircularResolution { name: self.name() };
        error!("{}", err);
        err
    }

    fn settle(&self, state: SlotState) {
        *self.state.lock() = state;
        release_waiters(self.key());
        self.settled.notify_all();
    }

    pub(crate) fn resolve(&self) -> Result<RcAny, ResolveErrorKind> {
        let name = self.name();
        let span = debug_span!("resolve", service = %name, provides = self.provides.short_name());
        let _guard = span.enter();

        let thread = current_thread();
        let mut state = self.state.lock();
        loop {
            match &*state {
                SlotState::Resolved(value) => {
                    debug!("Found in cache");
                    return Ok(value.clone());
                }
                SlotState::Pending => {
                    debug!("Not found in cache");
                    break;
                }
                SlotState::Resolving { owner } if *owner == thread => return Err(self.circular()),
                SlotState::Resolving { owner } => {
                    if !start_waiting(thread, self.key(), *owner) {
                        return Err(self.circular());
                    }
                    debug!("Waiting for another thread");
                    self.settled.wait(&mut state);
                    stop_waiting(thread);
                }
            }
        }

        let Some(factory) = self.factory.as_ref() else {
            unreachable!("slot without factory is created resolved");
        };

        *state = SlotState::Resolving { owner: thread };
        drop(state);

        let evaluation = Evaluation { slot: self, finished: false };
        match factory() {
            Ok(value) => {
                if self.config.cache_provides {
                    evaluation.finish(SlotState::Resolved(value.clone()));
                    debug!("Cached");
                } else {
                    evaluation.finish(SlotState::Pending);
                }
                Ok(value)
            }
            Err(err) => {
                evaluation.finish(SlotState::Pending);

                let source = match err {
                    InstantiateErrorKind::Dependency(err) => InstantiatorErrorKind::Deps(err),
                    err => InstantiatorErrorKind::Factory(err),
                };
                let err = ResolveErrorKind::Instantiator { name, source };
                error!("{}", err);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::{BoxedServiceFactory, ServiceSlot};
    use crate::{
        any::{RcAny, TypeInfo},
        config::Config,
        errors::{InstantiateErrorKind, InstantiatorErrorKind, ResolveErrorKind},
    };

    use alloc::{
        format,
        string::{String, ToString as _},
        sync::{Arc, Weak},
        vec::Vec,
    };
    use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};
    use parking_lot::Mutex;
    use std::sync::Barrier;
    use tracing_test::traced_test;

    fn counting_factory(call_count: Arc<AtomicU8>) -> BoxedServiceFactory {
        Arc::new(move || -> Result<RcAny, InstantiateErrorKind> {
            call_count.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(42u32) as RcAny)
        })
    }

    #[test]
    #[traced_test]
    fn test_resolve_cached() {
        let call_count = Arc::new(AtomicU8::new(0));
        let slot = ServiceSlot::new(
            "answer",
            TypeInfo::of::<u32>(),
            Config::default(),
            counting_factory(call_count.clone()),
        );

        let value_1 = slot.resolve().unwrap();
        let value_2 = slot.resolve().unwrap();

        assert!(Arc::ptr_eq(&value_1, &value_2));
        assert_eq!(*value_1.downcast::<u32>().unwrap(), 42);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[traced_test]
    fn test_resolve_transient() {
        let call_count = Arc::new(AtomicU8::new(0));
        let slot = ServiceSlot::new(
            "answer",
            TypeInfo::of::<u32>(),
            Config::transient(),
            counting_factory(call_count.clone()),
        );

        let value_1 = slot.resolve().unwrap();
        let value_2 = slot.resolve().unwrap();

        assert!(!Arc::ptr_eq(&value_1, &value_2));
        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    #[traced_test]
    fn test_resolve_circular() {
        let holder: Arc<Mutex<Weak<ServiceSlot>>> = Arc::new(Mutex::new(Weak::new()));
        let slot = Arc::new(ServiceSlot::new(
            "loop",
            TypeInfo::of::<u32>(),
            Config::default(),
            Arc::new({
                let holder = holder.clone();
                move || -> Result<RcAny, InstantiateErrorKind> {
                    let this = holder.lock().upgrade().unwrap();
                    this.resolve()?;
                    Ok(Arc::new(1u32) as RcAny)
                }
            }),
        ));
        *holder.lock() = Arc::downgrade(&slot);

        let err = slot.resolve().unwrap_err();

        assert!(matches!(
            err,
            ResolveErrorKind::Instantiator {
                source: InstantiatorErrorKind::Deps(_),
                ..
            }
        ));
        assert!(matches!(err.root_cause(), ResolveErrorKind::CircularResolution { name } if name == "loop"));
        // Failure isn't cached, the slot is usable again
        assert!(matches!(slot.resolve(), Err(ResolveErrorKind::Instantiator { .. })));
    }

    #[test]
    #[traced_test]
    fn test_resolve_from_threads() {
        let call_count = Arc::new(AtomicU8::new(0));
        let slot = Arc::new(ServiceSlot::new(
            "answer",
            TypeInfo::of::<u32>(),
            Config::default(),
            counting_factory(call_count.clone()),
        ));

        let handles = (0..4)
            .map(|_| {
                let slot = slot.clone();
                std::thread::spawn(move || slot.resolve().unwrap())
            })
            .collect::<Vec<_>>();
        for handle in handles {
            assert_eq!(*handle.join().unwrap().downcast::<u32>().unwrap(), 42);
        }

        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[traced_test]
    fn test_resolve_circular_across_threads() {
        type Holder = Arc<Mutex<Weak<ServiceSlot>>>;

        // Both factories start before either asks for the other
        let barrier = Arc::new(Barrier::new(2));
        let first_holder = Holder::default();
        let second_holder = Holder::default();

        let factory = |other: Holder| -> BoxedServiceFactory {
            let barrier = barrier.clone();
            let first_call = AtomicBool::new(true);
            Arc::new(move || -> Result<RcAny, InstantiateErrorKind> {
                if first_call.swap(false, Ordering::SeqCst) {
                    barrier.wait();
                }
                let other = other.lock().upgrade().unwrap();
                let value = other.resolve()?.downcast::<u32>().unwrap();
                Ok(Arc::new(*value + 1) as RcAny)
            })
        };
        let first = Arc::new(ServiceSlot::new(
            "a",
            TypeInfo::of::<u32>(),
            Config::default(),
            factory(second_holder.clone()),
        ));
        let second = Arc::new(ServiceSlot::new(
            "b",
            TypeInfo::of::<u32>(),
            Config::default(),
            factory(first_holder.clone()),
        ));
        *first_holder.lock() = Arc::downgrade(&first);
        *second_holder.lock() = Arc::downgrade(&second);

        let handles = [first.clone(), second.clone()].map(|slot| std::thread::spawn(move || slot.resolve()));
        for handle in handles {
            let err = handle.join().unwrap().unwrap_err();
            assert!(matches!(err.root_cause(), ResolveErrorKind::CircularResolution { .. }));
        }
    }

    #[test]
    #[traced_test]
    fn test_resolve_after_factory_panic() {
        let first_call = Arc::new(AtomicBool::new(true));
        let slot = Arc::new(ServiceSlot::new(
            "boom",
            TypeInfo::of::<u32>(),
            Config::default(),
            Arc::new({
                let first_call = first_call.clone();
                move || -> Result<RcAny, InstantiateErrorKind> {
                    if first_call.swap(false, Ordering::SeqCst) {
                        panic!("first call fails");
                    }
                    Ok(Arc::new(7u32) as RcAny)
                }
            }),
        ));

        let panicked = std::thread::spawn({
            let slot = slot.clone();
            move || slot.resolve()
        })
        .join();
        assert!(panicked.is_err());

        assert_eq!(*slot.resolve().unwrap().downcast::<u32>().unwrap(), 7);
    }

    #[test]
    #[traced_test]
    fn test_bind_names_once() {
        let slot = ServiceSlot::unbound(
            TypeInfo::of::<u32>(),
            Config::default(),
            Arc::new(|| -> Result<RcAny, InstantiateErrorKind> { Err(anyhow::anyhow!("nope").into()) }),
        );
        assert_eq!(slot.name(), "u32");

        slot.bind("answer");
        slot.bind("other");

        assert_eq!(slot.name(), "answer");
        assert!(matches!(slot.resolve(), Err(ResolveErrorKind::Instantiator { name, .. }) if name == "answer"));
    }
}
