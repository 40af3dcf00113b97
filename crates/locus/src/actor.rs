//! Actors, abilities, actions and questions.
//!
//! An [`Actor`] holds a set of [`Ability`] values keyed by their type.
//! [`Action`]s and [`Question`]s pull the ability they need out of the actor
//! and call into it; the engine itself knows nothing about this layer.
//!
//! Each actor runs its actions strictly in order. Separate actors share no
//! mutable state, so several can be driven concurrently (for example with
//! `tokio::join!`).

use crate::result::{LocusError, LocusResult};
use async_trait::async_trait;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use tracing::{info, warn};
use uuid::Uuid;

/// Capability an actor can be granted
pub trait Ability: Any + Send + Sync {}

/// Something an actor does
#[async_trait]
pub trait Action: Send + Sync {
    /// Perform the action using the actor's abilities
    async fn perform_as(&self, actor: &Actor) -> LocusResult<()>;

    /// Short description for logs
    fn describe(&self) -> String;
}

/// Something an actor can find out
#[async_trait]
pub trait Question: Send + Sync {
    /// Answer type
    type Answer: Send;

    /// Answer the question using the actor's abilities
    async fn answered_by(&self, actor: &Actor) -> LocusResult<Self::Answer>;

    /// Short description for logs
    fn describe(&self) -> String;
}

struct AbilityEntry {
    name: &'static str,
    ability: Box<dyn Any + Send + Sync>,
}

/// Abilities held by one actor, at most one per type
#[derive(Default)]
pub struct Abilities {
    entries: HashMap<TypeId, AbilityEntry>,
}

impl fmt::Debug for Abilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.entries.values().map(|e| e.name).collect();
        names.sort_unstable();
        f.debug_struct("Abilities").field("held", &names).finish()
    }
}

impl Abilities {
    /// Empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant `ability`, replacing one of the same type
    pub fn insert<A: Ability>(&mut self, ability: A) {
        let _ = self.entries.insert(
            TypeId::of::<A>(),
            AbilityEntry {
                name: type_name::<A>(),
                ability: Box::new(ability),
            },
        );
    }

    /// Ability of type `A`, if held
    #[must_use]
    pub fn get<A: Ability>(&self) -> Option<&A> {
        self.entries
            .get(&TypeId::of::<A>())
            .and_then(|entry| entry.ability.downcast_ref::<A>())
    }

    /// Whether an ability of type `A` is held
    #[must_use]
    pub fn contains<A: Ability>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<A>())
    }

    /// Number of abilities held
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no abilities are held
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Named participant with its own abilities and action timeline
#[derive(Debug)]
pub struct Actor {
    id: Uuid,
    name: String,
    abilities: Abilities,
}

impl Actor {
    /// New actor without abilities
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            abilities: Abilities::new(),
        }
    }

    /// Grant an ability
    #[must_use]
    pub fn who_can<A: Ability>(mut self, ability: A) -> Self {
        self.abilities.insert(ability);
        self
    }

    /// Unique id, used to tell actors apart in logs
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Display name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Held abilities
    #[must_use]
    pub const fn abilities(&self) -> &Abilities {
        &self.abilities
    }

    /// Ability of type `A`, or [`LocusError::MissingAbility`]
    pub fn ability<A: Ability>(&self) -> LocusResult<&A> {
        self.abilities
            .get::<A>()
            .ok_or_else(|| LocusError::MissingAbility {
                actor: self.name.clone(),
                ability: type_name::<A>(),
            })
    }

    /// Run `actions` in order, stopping at the first failure
    pub async fn attempts_to(&self, actions: &[&dyn Action]) -> LocusResult<()> {
        for (step, action) in actions.iter().enumerate() {
            let description = action.describe();
            info!(actor = %self.name, actor_id = %self.id, step, action = %description, "attempting");
            if let Err(err) = action.perform_as(self).await {
                warn!(
                    actor = %self.name,
                    actor_id = %self.id,
                    step,
                    action = %description,
                    skipped = actions.len() - step - 1,
                    error = %err,
                    "action failed"
                );
                return Err(err);
            }
        }
        Ok(())
    }

    /// Answer `question`
    pub async fn asks<Q: Question + ?Sized>(&self, question: &Q) -> LocusResult<Q::Answer> {
        info!(actor = %self.name, actor_id = %self.id, question = %question.describe(), "asking");
        question.answered_by(self).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct Notebook {
        lines: Mutex<Vec<String>>,
    }

    impl Ability for Notebook {}

    #[derive(Debug)]
    struct Unused;

    impl Ability for Unused {}

    struct Write(&'static str);

    #[async_trait]
    impl Action for Write {
        async fn perform_as(&self, actor: &Actor) -> LocusResult<()> {
            actor
                .ability::<Notebook>()?
                .lines
                .lock()
                .unwrap()
                .push(self.0.to_string());
            Ok(())
        }

        fn describe(&self) -> String {
            format!("write {}", self.0)
        }
    }

    struct Fail;

    #[async_trait]
    impl Action for Fail {
        async fn perform_as(&self, _actor: &Actor) -> LocusResult<()> {
            Err(LocusError::scope("page closed"))
        }

        fn describe(&self) -> String {
            "fail".to_string()
        }
    }

    struct LineCount;

    #[async_trait]
    impl Question for LineCount {
        type Answer = usize;

        async fn answered_by(&self, actor: &Actor) -> LocusResult<usize> {
            Ok(actor.ability::<Notebook>()?.lines.lock().unwrap().len())
        }

        fn describe(&self) -> String {
            "line count".to_string()
        }
    }

    mod abilities_tests {
        use super::*;

        #[test]
        fn test_lookup_by_type() {
            let actor = Actor::named("ada").who_can(Notebook::default());
            assert!(actor.abilities().contains::<Notebook>());
            assert!(!actor.abilities().contains::<Unused>());
            assert_eq!(actor.abilities().len(), 1);
        }

        #[test]
        fn test_missing_ability_names_actor_and_type() {
            let actor = Actor::named("ada");
            let err = actor.ability::<Notebook>().unwrap_err();
            match err {
                LocusError::MissingAbility { actor, ability } => {
                    assert_eq!(actor, "ada");
                    assert!(ability.ends_with("Notebook"));
                }
                other => panic!("unexpected error {other}"),
            }
        }

        #[test]
        fn test_regrant_replaces() {
            let first = Notebook::default();
            first.lines.lock().unwrap().push("old".into());
            let actor = Actor::named("ada")
                .who_can(first)
                .who_can(Notebook::default());
            assert_eq!(actor.abilities().len(), 1);
            assert!(actor.ability::<Notebook>().unwrap().lines.lock().unwrap().is_empty());
        }

        #[test]
        fn test_actors_have_distinct_ids() {
            assert_ne!(Actor::named("a").id(), Actor::named("a").id());
        }
    }

    mod timeline_tests {
        use super::*;

        #[tokio::test]
        async fn test_actions_run_in_order() {
            let actor = Actor::named("ada").who_can(Notebook::default());
            actor
                .attempts_to(&[&Write("one"), &Write("two"), &Write("three")])
                .await
                .unwrap();
            let lines = actor.ability::<Notebook>().unwrap().lines.lock().unwrap().clone();
            assert_eq!(lines, vec!["one", "two", "three"]);
        }

        #[tokio::test]
        async fn test_failure_halts_remaining_actions() {
            let actor = Actor::named("ada").who_can(Notebook::default());
            let err = actor
                .attempts_to(&[&Write("one"), &Fail, &Write("never")])
                .await
                .unwrap_err();
            assert!(err.to_string().contains("page closed"));
            assert_eq!(actor.asks(&LineCount).await.unwrap(), 1);
        }

        #[tokio::test]
        async fn test_action_without_ability_fails() {
            let actor = Actor::named("bob");
            let err = actor.attempts_to(&[&Write("one")]).await.unwrap_err();
            assert!(matches!(err, LocusError::MissingAbility { .. }));
        }
    }
}
