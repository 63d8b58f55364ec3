#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use std::time::Duration;

    use futures::FutureExt;
    use futures::channel::oneshot;
    use futures::executor::LocalPool;

    use crate::*;

    #[derive(Clone, Debug, PartialEq)]
    struct User {
        id: u32,
    }

    type Outcome = FetchOutcome<String, User>;
    type Seen = Rc<RefCell<Vec<(Status, Option<User>, i64)>>>;

    /// Fake server recording every fetcher call.
    #[derive(Clone, Default)]
    struct Backend {
        calls: Rc<RefCell<Vec<StaticKey>>>,
        gates: Rc<RefCell<Vec<Option<oneshot::Sender<Outcome>>>>>,
    }

    impl Backend {
        fn replying(&self, reply: impl Fn(&StaticKey) -> Outcome + 'static) -> Fetcher<String, User> {
            let backend = self.clone();
            fetcher(move |key: StaticKey| {
                let outcome = reply(&key);
                backend.calls.borrow_mut().push(key);
                async move { outcome }
            })
        }

        /// Responses are released by hand, in any order.
        fn gated(&self) -> Fetcher<String, User> {
            let backend = self.clone();
            fetcher(move |key: StaticKey| {
                backend.calls.borrow_mut().push(key);
                let (tx, rx) = oneshot::channel();
                backend.gates.borrow_mut().push(Some(tx));
                async move {
                    rx.await
                        .unwrap_or_else(|_| FetchOutcome::Failure("cancelled".into()))
                }
            })
        }

        fn release(&self, request: usize, outcome: Outcome) {
            let gate = self.gates.borrow_mut()[request].take();
            gate.expect("request already released")
                .send(outcome)
                .ok();
        }

        fn calls(&self) -> usize {
            self.calls.borrow().len()
        }
    }

    fn user(id: u32) -> Outcome {
        FetchOutcome::Success(User { id })
    }

    fn setup(config: CacheConfig) -> (LocalPool, Cache, ManualClock) {
        let pool = LocalPool::new();
        let clock = ManualClock::new(1_000);
        let cache = Cache::builder(pool.spawner())
            .config(config)
            .clock(clock.clone())
            .build();
        (pool, cache, clock)
    }

    fn record(entry: &Entry<String, User>) -> Seen {
        let seen: Seen = Rc::default();
        let sink = seen.clone();
        entry
            .add_change_listener(move |state| {
                sink.borrow_mut()
                    .push((state.status(), state.data().cloned(), state.timestamp));
            })
            .unwrap();
        seen
    }

    fn call() -> PartialConfig<String, User> {
        PartialConfig::new()
    }

    #[test]
    fn test_fetch_success_flow() {
        let backend = Backend::default();
        let (mut pool, cache, clock) = setup(CacheConfig::new().fetcher(backend.replying(|key| {
            if key.first() == "/success" {
                user(0)
            } else {
                FetchOutcome::Failure("not found".into())
            }
        })));

        let entry = cache.entry::<String, User>("/success").unwrap();
        assert_eq!(entry.state().unwrap().status(), Status::Pristine);

        let first = entry.fetch(call()).unwrap();
        assert_eq!(first.status(), Status::Pending);
        assert_eq!(first.data(), None);

        pool.run_until_stalled();
        let settled = entry.fetch(call()).unwrap();
        assert_eq!(settled.status(), Status::Success);
        assert_eq!(settled.data(), Some(&User { id: 0 }));
        assert_eq!(backend.calls(), 1);

        // a later refetch shows the cached data while pending
        clock.advance(2_000);
        entry.refetch(call()).unwrap();
        let pending = entry.state().unwrap();
        assert_eq!(pending.status(), Status::Pending);
        assert_eq!(pending.data(), Some(&User { id: 0 }));
        pool.run_until_stalled();
        assert_eq!(backend.calls(), 2);
    }

    #[test]
    fn test_dedup_window() {
        let backend = Backend::default();
        let (_pool, cache, clock) = setup(CacheConfig::new().fetcher(backend.replying(|_| user(1))));
        let entry = cache.entry::<String, User>("/me").unwrap();

        let first = pollster::block_on(entry.revalidate(call())).unwrap();
        assert_eq!(first, Some(User { id: 1 }));

        clock.advance(1_999);
        let second = pollster::block_on(entry.revalidate(call())).unwrap();
        assert_eq!(second, None);
        assert_eq!(backend.calls(), 1);

        clock.advance(1);
        let third = pollster::block_on(entry.revalidate(call())).unwrap();
        assert_eq!(third, Some(User { id: 1 }));
        assert_eq!(backend.calls(), 2);
    }

    #[test]
    fn test_zero_interval_allows_back_to_back() {
        let backend = Backend::default();
        let (_pool, cache, _clock) = setup(
            CacheConfig::new()
                .deduping_interval(Duration::ZERO)
                .fetcher(backend.replying(|_| user(1))),
        );
        let entry = cache.entry::<String, User>("/me").unwrap();

        pollster::block_on(entry.revalidate(call())).unwrap();
        pollster::block_on(entry.revalidate(call())).unwrap();
        assert_eq!(backend.calls(), 2);
    }

    #[test]
    fn test_pending_suppresses_revalidate() {
        let backend = Backend::default();
        let (mut pool, cache, clock) = setup(
            CacheConfig::new()
                .deduping_interval(Duration::ZERO)
                .fetcher(backend.gated()),
        );
        let entry = cache.entry::<String, User>("/slow").unwrap();

        entry.fetch(call()).unwrap();
        let seen = record(&entry);

        clock.advance(10_000);
        assert_eq!(pollster::block_on(entry.revalidate(call())).unwrap(), None);
        assert_eq!(entry.fetch(call()).unwrap().status(), Status::Pending);
        assert_eq!(backend.calls(), 1);
        assert!(seen.borrow().is_empty());

        backend.release(0, user(3));
        pool.run_until_stalled();
        assert_eq!(
            *seen.borrow(),
            vec![(Status::Success, Some(User { id: 3 }), 1_000)]
        );
    }

    #[test]
    fn test_fetch_from_listener_sees_its_own_request() {
        let backend = Backend::default();
        let (mut pool, cache, clock) = setup(CacheConfig::new().fetcher(backend.gated()));
        let entry = cache.entry::<String, User>("/me").unwrap();
        entry.fetch(call()).unwrap();

        let returned = Rc::new(RefCell::new(Vec::new()));
        {
            let inner = entry.clone();
            let returned = returned.clone();
            entry
                .add_change_listener(move |state| {
                    if state.status() == Status::Failure {
                        for _ in 0..2 {
                            let snapshot = inner.fetch(call()).unwrap();
                            returned.borrow_mut().push(snapshot.status());
                        }
                    }
                })
                .unwrap();
        }

        clock.advance(10_000);
        backend.release(0, FetchOutcome::Failure("offline".into()));
        pool.run_until_stalled();

        assert_eq!(*returned.borrow(), vec![Status::Pending, Status::Pending]);
        assert_eq!(backend.calls(), 2);
        assert_eq!(entry.state().unwrap().timestamp(), Some(11_000));
    }

    #[test]
    fn test_mutate_from_listener_builds_on_latest() {
        let (_pool, cache, _clock) = setup(CacheConfig::new().revalidate(false));
        let entry = cache.entry::<String, User>("/counter").unwrap();
        {
            let inner = entry.clone();
            entry
                .add_change_listener(move |state| {
                    if state.data() == Some(&User { id: 1 }) {
                        for _ in 0..2 {
                            let bump = Mutation::update(|current: Option<&User>| User {
                                id: current.map_or(0, |u| u.id + 1),
                            });
                            inner.mutate(bump, call()).now_or_never().unwrap().unwrap();
                        }
                    }
                })
                .unwrap();
        }

        pollster::block_on(entry.mutate(User { id: 1 }, call())).unwrap();

        assert_eq!(entry.state().unwrap().data(), Some(&User { id: 3 }));
    }

    #[test]
    fn test_spawn_failure_leaves_entry_untouched() {
        let backend = Backend::default();
        let (pool, cache, _clock) =
            setup(CacheConfig::new().fetcher(backend.replying(|_| user(1))));
        drop(pool);
        let entry = cache.entry::<String, User>("/me").unwrap();

        let err = entry.fetch(call()).unwrap_err();
        assert_eq!(err, CacheError::Spawn(StaticKey::from("/me")));
        assert_eq!(entry.state().unwrap().status(), Status::Pristine);

        let data = pollster::block_on(entry.revalidate(call())).unwrap();
        assert_eq!(data, Some(User { id: 1 }));
        assert_eq!(backend.calls(), 2);
    }

    #[test]
    fn test_abandoned_revalidate_restores_entry() {
        let backend = Backend::default();
        let (_pool, cache, _clock) = setup(CacheConfig::new().fetcher(backend.gated()));
        let entry = cache.entry::<String, User>("/me").unwrap();

        let mut request = Box::pin(entry.revalidate(call()));
        assert!((&mut request).now_or_never().is_none());
        assert_eq!(entry.state().unwrap().status(), Status::Pending);
        drop(request);

        let snapshot = entry.state().unwrap();
        assert_eq!(snapshot.status(), Status::Pristine);
        assert_eq!(snapshot.timestamp(), Some(NEVER));

        assert_eq!(entry.fetch(call()).unwrap().status(), Status::Pending);
        assert_eq!(backend.calls(), 2);
    }

    #[test]
    fn test_abandoned_mutate_keeps_optimistic_value() {
        let backend = Backend::default();
        let (_pool, cache, _clock) = setup(CacheConfig::new().fetcher(backend.gated()));
        let entry = cache.entry::<String, User>("/me").unwrap();

        let mut mutation = Box::pin(entry.mutate(User { id: 5 }, call()));
        assert!((&mut mutation).now_or_never().is_none());
        assert_eq!(entry.state().unwrap().status(), Status::Pending);
        drop(mutation);

        let snapshot = entry.state().unwrap();
        assert_eq!(snapshot.status(), Status::Success);
        assert_eq!(snapshot.data(), Some(&User { id: 5 }));
        assert_eq!(snapshot.timestamp(), Some(NEVER));
    }

    #[test]
    fn test_optimistic_then_reconcile() {
        let backend = Backend::default();
        let (_pool, cache, _clock) =
            setup(CacheConfig::new().fetcher(backend.replying(|_| user(9))));
        let entry = cache.entry::<String, User>("/me").unwrap();
        let seen = record(&entry);

        let result = pollster::block_on(entry.mutate(User { id: 5 }, call())).unwrap();

        assert_eq!(result, Some(User { id: 9 }));
        assert_eq!(
            *seen.borrow(),
            vec![
                (Status::Success, Some(User { id: 5 }), NEVER),
                (Status::Pending, Some(User { id: 5 }), 1_000),
                (Status::Success, Some(User { id: 9 }), 1_000),
            ]
        );
        assert_eq!(backend.calls(), 1);
    }

    #[test]
    fn test_mutate_without_revalidate_keeps_timestamp() {
        let backend = Backend::default();
        let (_pool, cache, clock) =
            setup(CacheConfig::new().fetcher(backend.replying(|_| user(1))));
        clock.set(100);
        let entry = cache.entry::<String, User>("/me").unwrap();
        pollster::block_on(entry.revalidate(call())).unwrap();

        let result =
            pollster::block_on(entry.mutate(User { id: 2 }, call().revalidate(false))).unwrap();

        assert_eq!(result, Some(User { id: 2 }));
        let snapshot = entry.state().unwrap();
        assert_eq!(snapshot.status(), Status::Success);
        assert_eq!(snapshot.timestamp(), Some(100));
        assert_eq!(snapshot.data(), Some(&User { id: 2 }));
        assert_eq!(backend.calls(), 1);
    }

    #[test]
    fn test_mutation_forms() {
        let (_pool, cache, _clock) = setup(CacheConfig::new().revalidate(false));
        let entry = cache.entry::<String, User>("/counter").unwrap();

        let from_nothing = Mutation::update(|current: Option<&User>| User {
            id: current.map_or(0, |u| u.id + 1),
        });
        assert_eq!(
            pollster::block_on(entry.mutate(from_nothing, call())).unwrap(),
            Some(User { id: 0 })
        );

        let bumped = Mutation::update(|current: Option<&User>| User {
            id: current.map_or(0, |u| u.id + 1),
        });
        pollster::block_on(entry.mutate(bumped, call())).unwrap();

        let later = Mutation::future(async { User { id: 40 } });
        pollster::block_on(entry.mutate(later, call())).unwrap();

        let doubled = Mutation::update_async(|current: Option<&User>| {
            let id = current.map_or(0, |u| u.id * 2);
            async move { User { id } }
        });
        pollster::block_on(entry.mutate(doubled, call())).unwrap();

        assert_eq!(entry.state().unwrap().data(), Some(&User { id: 80 }));
    }

    #[test]
    fn test_stale_response_is_rejected() {
        let backend = Backend::default();
        let (mut pool, cache, clock) = setup(
            CacheConfig::new()
                .deduping_interval(Duration::ZERO)
                .fetcher(backend.gated()),
        );
        let entry = cache.entry::<String, User>("/race").unwrap();

        clock.set(100);
        entry.fetch(call()).unwrap();
        // settle locally so a second request can start while the first is out
        pollster::block_on(entry.mutate(User { id: 0 }, call().revalidate(false))).unwrap();

        clock.set(300);
        assert_eq!(entry.fetch(call()).unwrap().status(), Status::Pending);
        assert_eq!(backend.calls(), 2);

        backend.release(1, user(2));
        pool.run_until_stalled();
        let seen = record(&entry);

        backend.release(0, user(1));
        pool.run_until_stalled();

        let snapshot = entry.state().unwrap();
        assert_eq!(snapshot.data(), Some(&User { id: 2 }));
        assert_eq!(snapshot.timestamp(), Some(300));
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_stale_failure_is_rejected() {
        let backend = Backend::default();
        let (mut pool, cache, clock) = setup(
            CacheConfig::new()
                .deduping_interval(Duration::ZERO)
                .fetcher(backend.gated()),
        );
        let entry = cache.entry::<String, User>("/race").unwrap();

        entry.fetch(call()).unwrap();
        pollster::block_on(entry.mutate(User { id: 0 }, call().revalidate(false))).unwrap();
        clock.advance(50);
        entry.fetch(call()).unwrap();
        backend.release(1, user(2));
        backend.release(0, FetchOutcome::Failure("timeout".into()));
        pool.run_until_stalled();

        let snapshot = entry.state().unwrap();
        assert_eq!(snapshot.status(), Status::Success);
        assert_eq!(snapshot.error(), None);
        assert_eq!(snapshot.data(), Some(&User { id: 2 }));
    }

    #[test]
    fn test_failure_keeps_last_good_data() {
        let backend = Backend::default();
        let healthy = Rc::new(Cell::new(true));
        let flag = healthy.clone();
        let (_pool, cache, clock) = setup(CacheConfig::new().fetcher(backend.replying(move |_| {
            if flag.get() {
                user(7)
            } else {
                FetchOutcome::Failure("503".into())
            }
        })));
        let entry = cache.entry::<String, User>("/me").unwrap();
        pollster::block_on(entry.revalidate(call())).unwrap();

        healthy.set(false);
        clock.advance(5_000);
        let result = pollster::block_on(entry.revalidate(call())).unwrap();

        assert_eq!(result, Some(User { id: 7 }));
        let snapshot = entry.state().unwrap();
        assert_eq!(snapshot.status(), Status::Failure);
        assert_eq!(snapshot.error().map(String::as_str), Some("503"));
        assert_eq!(snapshot.data(), Some(&User { id: 7 }));
    }

    #[test]
    fn test_void_cache_resets_before_request() {
        let backend = Backend::default();
        let (_pool, cache, clock) =
            setup(CacheConfig::new().fetcher(backend.replying(|_| user(4))));
        let entry = cache.entry::<String, User>("/me").unwrap();
        pollster::block_on(entry.revalidate(call())).unwrap();
        let seen = record(&entry);

        clock.advance(3_000);
        pollster::block_on(entry.revalidate(call().void_cache(true))).unwrap();

        assert_eq!(
            *seen.borrow(),
            vec![
                (Status::Pristine, None, NEVER),
                (Status::Pending, None, 4_000),
                (Status::Success, Some(User { id: 4 }), 4_000),
            ]
        );
    }

    #[test]
    fn test_starving_key_never_fetches() {
        let backend = Backend::default();
        let (mut pool, cache, _clock) =
            setup(CacheConfig::new().fetcher(backend.replying(|_| user(1))));
        let entry = cache
            .entry::<String, User>(Key::lazy(|| None))
            .unwrap();

        assert!(!entry.ready());
        assert_eq!(entry.key(), None);
        for _ in 0..3 {
            assert_eq!(entry.fetch(call()).unwrap(), Snapshot::Starving);
            entry.refetch(call()).unwrap();
        }
        assert_eq!(pollster::block_on(entry.revalidate(call())).unwrap(), None);
        assert_eq!(
            pollster::block_on(entry.mutate(User { id: 1 }, call())).unwrap(),
            None
        );
        let sub = entry.add_change_listener(|_| {}).unwrap();
        assert_eq!(sub.id(), None);

        pool.run_until_stalled();
        assert_eq!(backend.calls(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_lazy_key_resolved_per_lookup() {
        let backend = Backend::default();
        let (mut pool, cache, _clock) =
            setup(CacheConfig::new().fetcher(backend.replying(|_| user(8))));
        let signed_in: Rc<RefCell<Option<String>>> = Rc::default();
        let session = signed_in.clone();
        let key = Key::lazy(move || {
            session
                .borrow()
                .as_ref()
                .map(|name| StaticKey::from(vec!["/users".to_owned(), name.clone()]))
        });

        assert!(!cache.entry::<String, User>(key.clone()).unwrap().ready());

        *signed_in.borrow_mut() = Some("ada".into());
        let entry = cache.entry::<String, User>(key).unwrap();
        assert!(entry.ready());
        entry.fetch(call()).unwrap();
        pool.run_until_stalled();

        assert_eq!(
            *backend.calls.borrow(),
            vec![StaticKey::Tuple(vec!["/users".into(), "ada".into()])]
        );
    }

    #[test]
    fn test_read_only_fetch() {
        let backend = Backend::default();
        let (mut pool, cache, _clock) = setup(
            CacheConfig::new()
                .revalidate(false)
                .fetcher(backend.replying(|_| user(1))),
        );
        let entry = cache.entry::<String, User>("/me").unwrap();

        assert_eq!(entry.fetch(call()).unwrap().status(), Status::Pristine);
        pool.run_until_stalled();
        assert_eq!(backend.calls(), 0);

        assert_eq!(
            entry.fetch(call().revalidate(true)).unwrap().status(),
            Status::Pending
        );
    }

    #[test]
    fn test_missing_fetcher() {
        let (_pool, cache, _clock) = setup(CacheConfig::new());
        let entry = cache.entry::<String, User>("/me").unwrap();

        let err = entry.fetch(call()).unwrap_err();
        assert_eq!(err, CacheError::NoFetcher(StaticKey::from("/me")));
        assert_eq!(entry.state().unwrap().status(), Status::Pristine);

        assert!(pollster::block_on(entry.mutate(User { id: 1 }, call())).is_err());
        assert_eq!(entry.state().unwrap().status(), Status::Pristine);

        pollster::block_on(entry.mutate(User { id: 1 }, call().revalidate(false))).unwrap();
        assert_eq!(entry.state().unwrap().status(), Status::Success);
    }

    #[test]
    fn test_fetcher_layering() {
        let global = Backend::default();
        let local = Backend::default();
        let per_call = Backend::default();
        let (_pool, cache, clock) = setup(CacheConfig::new().fetcher(global.replying(|_| user(1))));

        let plain = cache.entry::<String, User>("/a").unwrap();
        let custom = cache
            .entry_with::<String, User>("/b", PartialConfig::new().fetcher(local.replying(|_| user(2))))
            .unwrap();

        pollster::block_on(plain.revalidate(call())).unwrap();
        pollster::block_on(custom.revalidate(call())).unwrap();
        clock.advance(5_000);
        pollster::block_on(custom.revalidate(call().fetcher(per_call.replying(|_| user(3))))).unwrap();

        assert_eq!((global.calls(), local.calls(), per_call.calls()), (1, 1, 1));
        assert_eq!(custom.state().unwrap().data(), Some(&User { id: 3 }));
    }

    #[test]
    fn test_slot_type_is_fixed() {
        let (_pool, cache, _clock) = setup(CacheConfig::new());
        cache.entry::<String, User>("/me").unwrap();

        let err = cache.entry::<String, u32>("/me").unwrap_err();
        assert!(matches!(err, CacheError::TypeMismatch { .. }));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_tuple_key_shares_flattened_slot() {
        let (_pool, cache, _clock) = setup(CacheConfig::new().revalidate(false));
        let tuple = cache.entry::<String, User>(["users", "7"]).unwrap();
        let flat = cache.entry::<String, User>("users:7").unwrap();
        let again = cache.entry::<String, User>(vec!["users", "7"]).unwrap();

        pollster::block_on(tuple.mutate(User { id: 7 }, call())).unwrap();

        assert_eq!(cache.len(), 1);
        assert_eq!(flat.state().unwrap().data(), Some(&User { id: 7 }));
        assert_eq!(again.state().unwrap().data(), Some(&User { id: 7 }));
    }

    #[test]
    fn test_listener_removal() {
        let backend = Backend::default();
        let (_pool, cache, _clock) =
            setup(CacheConfig::new().fetcher(backend.replying(|_| user(1))));
        let entry = cache.entry::<String, User>("/me").unwrap();
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        let sub = entry
            .add_change_listener(move |_| counter.set(counter.get() + 1))
            .unwrap();

        assert!(entry.remove_change_listener(sub.id().unwrap()).unwrap());
        pollster::block_on(entry.revalidate(call())).unwrap();
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn test_cache_context() {
        let (_pool, cache, _clock) = setup(CacheConfig::new());
        assert!(use_cache().is_err());
        with_cache(&cache, || {
            let scoped = use_cache().unwrap();
            scoped.entry::<String, User>("/scoped").unwrap();
        });
        assert_eq!(cache.len(), 1);
    }
}
