//! Política de acceso por listas.
//!
//! Evalúa quién puede operar la cola: los ids de `allowedIds` y
//! `adminIds`. Con ambas listas vacías, cualquier usuario identificado
//! puede encolar (despliegue abierto).

use crate::state::AccessConfig;
use std::collections::HashSet;

#[derive(Clone, Debug, Default)]
pub struct AccessPolicy {
    allowed: HashSet<String>,
    admins: HashSet<String>,
}

impl AccessPolicy {
    pub fn new(cfg: &AccessConfig) -> Self {
        Self {
            allowed: cfg.allowed_ids.iter().cloned().collect(),
            admins: cfg.admin_ids.iter().cloned().collect(),
        }
    }

    pub fn can_queue(&self, user_id: &str) -> bool {
        if self.allowed.is_empty() && self.admins.is_empty() {
            return true;
        }
        self.allowed.contains(user_id) || self.admins.contains(user_id)
    }

    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admins.contains(user_id)
    }
}
