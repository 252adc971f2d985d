use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use lns_db::RecordStore;
use lns_schemas::{Actor, SYSTEM_LOGIN};

/// Trimmed login, or `"system"` when absent or blank.
pub fn normalize_login(raw: Option<&str>) -> &str {
    match raw.map(str::trim) {
        Some(s) if !s.is_empty() => s,
        _ => SYSTEM_LOGIN,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedActor {
    pub actor: Actor,
    /// This call created the actor.
    pub created: bool,
}

/// Maps source author logins to local actors, creating them on first sight.
///
/// One resolver per partition task. The cache is task-local; cross-task races
/// on the same login are settled by the store's atomic upsert.
pub struct UserResolver {
    store: Arc<dyn RecordStore>,
    cache: HashMap<String, Actor>,
}

impl UserResolver {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            cache: HashMap::new(),
        }
    }

    pub async fn resolve(&mut self, raw_login: Option<&str>) -> Result<ResolvedActor> {
        let login = normalize_login(raw_login);
        if let Some(actor) = self.cache.get(login) {
            return Ok(ResolvedActor {
                actor: actor.clone(),
                created: false,
            });
        }

        let resolved = match self.store.find_actor(login).await? {
            Some(actor) => ResolvedActor {
                actor,
                created: false,
            },
            None => {
                let (actor, created) = self.store.upsert_actor(login).await?;
                if created {
                    tracing::info!(login, actor_id = actor.id, "actor created");
                }
                ResolvedActor { actor, created }
            }
        };
        self.cache
            .insert(login.to_string(), resolved.actor.clone());
        Ok(resolved)
    }
}
