use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use anyhow::Context;
use futures::executor::LocalPool;
use nucleon_cache::*;
use nucleon_core::{StateAtom, Store};
use nucleon_devtools::TransitionLog;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Profile {
    id: u32,
    name: String,
    followers: u32,
}

/// In-memory stand-in for a JSON API keyed by `["/users", id]`.
#[derive(Clone, Default)]
struct FakeApi {
    rows: Rc<RefCell<HashMap<u32, String>>>,
}

impl FakeApi {
    fn put(&self, profile: &Profile) -> anyhow::Result<()> {
        let body = serde_json::to_string(profile)?;
        self.rows.borrow_mut().insert(profile.id, body);
        Ok(())
    }

    fn get(&self, key: &StaticKey) -> Result<Profile, String> {
        let StaticKey::Tuple(parts) = key else {
            return Err(format!("unexpected key {key}"));
        };
        let id: u32 = parts
            .get(1)
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| format!("bad id in {key}"))?;
        let body = self
            .rows
            .borrow()
            .get(&id)
            .cloned()
            .ok_or_else(|| format!("404 {key}"))?;
        serde_json::from_str(&body).map_err(|e| e.to_string())
    }

    fn fetcher(&self) -> Fetcher<String, Profile> {
        let api = self.clone();
        fetcher(move |key: StaticKey| {
            let result = api.get(&key);
            async move { FetchOutcome::from(result) }
        })
    }
}

fn show(label: &str, snapshot: &Snapshot<String, Profile>) {
    match snapshot.error() {
        Some(err) => println!("{label:>10}: {:?} ({err})", snapshot.status()),
        None => println!("{label:>10}: {:?} {:?}", snapshot.status(), snapshot.data()),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut pool = LocalPool::new();
    let clock = ManualClock::new(0);
    let api = FakeApi::default();
    api.put(&Profile {
        id: 1,
        name: "ada".into(),
        followers: 10,
    })?;
    api.put(&Profile {
        id: 2,
        name: "grace".into(),
        followers: 7,
    })?;

    let store = Store::new();
    let selected: StateAtom<Option<u32>> = store.state_atom(None);
    let _selection = store.select(&selected, |id| *id, |id| log::info!("selected {id:?}"))?;

    let cache = Cache::builder(pool.spawner())
        .config(CacheConfig::new().fetcher(api.fetcher()))
        .clock(clock.clone())
        .build();

    let profile_key = {
        let store = store.clone();
        Key::lazy(move || {
            let id = (*store.state(&selected).ok()?)?;
            Some(StaticKey::from(vec!["/users".to_owned(), id.to_string()]))
        })
    };

    let idle = cache.entry::<String, Profile>(profile_key.clone())?;
    show("idle", &idle.fetch(PartialConfig::new())?);

    store.set(&selected, Some(1_u32))?;
    let current = cache.entry::<String, Profile>(profile_key.clone())?;
    let transitions = TransitionLog::attach_entry(&current, "profile")?;

    show("requested", &current.fetch(PartialConfig::new())?);
    pool.run_until_stalled();
    show("loaded", &current.state()?);
    // within the deduping interval: served from cache
    show("again", &current.fetch(PartialConfig::new())?);

    clock.advance(2_000);
    let mut followed = current
        .state()?
        .data()
        .cloned()
        .context("profile should be loaded")?;
    followed.followers += 1;
    api.put(&followed)?;
    let reconciled = pool.run_until(current.mutate(followed, PartialConfig::new()))?;
    println!("reconciled: {reconciled:?}");

    store.set(&selected, Some(3_u32))?;
    let missing = cache.entry::<String, Profile>(profile_key)?;
    missing.fetch(PartialConfig::new())?;
    pool.run_until_stalled();
    show("missing", &missing.state()?);

    transitions.detach();
    for t in transitions.transitions() {
        println!("  #{} {}", t.seq, t.summary);
    }
    println!("{} entries cached", cache.len());
    Ok(())
}
