use std::collections::HashMap;

use crate::config::{Config, ServiceRole, SiteConfig};

use super::models::EntityKind;

/// Name of the table the primary keeps its key sequences in.
pub const KEY_SEQUENCES_TABLE: &str = "key_sequences";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyStrategy {
    /// Draw from a provisioned key sequence.
    Sequence(String),
    /// `MAX(id) + 1` inside the insert's transaction.
    MaxPlusOne,
    /// Inserts are never issued.
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadWrite,
    ReadOnly,
}

#[derive(Debug, Clone)]
pub struct TableSpec {
    pub kind: EntityKind,
    pub table: String,
    pub fixed_value: Option<String>,
    pub key: KeyStrategy,
    pub access: Access,
    pub masked: bool,
}

impl TableSpec {
    pub fn is_writable(&self) -> bool {
        self.access == Access::ReadWrite
    }

    pub fn sequence_name(&self) -> Option<&str> {
        match &self.key {
            KeyStrategy::Sequence(name) => Some(name),
            _ => None,
        }
    }
}

/// Physical layout of every entity for one service role.
#[derive(Debug, Clone)]
pub struct Catalog {
    role: ServiceRole,
    specs: HashMap<EntityKind, TableSpec>,
    audit_table: String,
    audit_user: String,
}

impl Catalog {
    pub fn new(
        role: ServiceRole,
        site: &SiteConfig,
        audit_user: impl Into<String>,
        mask_cards: bool,
    ) -> Self {
        let mut specs = HashMap::new();

        for kind in EntityKind::ALL {
            let spec = match role {
                ServiceRole::Primary => Self::primary_spec(kind, site),
                ServiceRole::Replica => Self::replica_spec(kind, site),
            };
            let spec = TableSpec {
                masked: kind == EntityKind::Cards && mask_cards,
                ..spec
            };
            specs.insert(kind, spec);
        }

        let audit_table = match role {
            ServiceRole::Primary => "auditoria_master",
            ServiceRole::Replica => "auditoria_esclavo",
        }
        .to_string();

        Self {
            role,
            specs,
            audit_table,
            audit_user: audit_user.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.service.role,
            &config.site,
            config.audit_user(),
            config.service.masks_card_numbers(),
        )
    }

    fn primary_spec(kind: EntityKind, site: &SiteConfig) -> TableSpec {
        let role = ServiceRole::Primary;
        let (table, sequence, fixed_value) = match kind {
            EntityKind::Products => ("producto", "producto_seq", None),
            EntityKind::Customers => (
                "cliente_chillogallo",
                "cliente_seq",
                Some(site.customer_district(role)),
            ),
            EntityKind::Branches => (
                "sucursal_qs",
                "sucursal_seq",
                Some(site.branch_city(role)),
            ),
            EntityKind::Employees => (
                "empleado_sur",
                "empleado_seq",
                Some(site.employee_zone(role)),
            ),
            EntityKind::Cards => ("tarjeta", "tarjeta_seq", None),
            EntityKind::Factories => ("fabrica", "fabrica_seq", None),
        };

        TableSpec {
            kind,
            table: table.to_string(),
            fixed_value,
            key: KeyStrategy::Sequence(sequence.to_string()),
            access: Access::ReadWrite,
            masked: false,
        }
    }

    fn replica_spec(kind: EntityKind, site: &SiteConfig) -> TableSpec {
        let role = ServiceRole::Replica;
        let read_only = |table: &str| TableSpec {
            kind,
            table: table.to_string(),
            fixed_value: None,
            key: KeyStrategy::None,
            access: Access::ReadOnly,
            masked: false,
        };
        let local = |table: &str, fixed_value: String| TableSpec {
            kind,
            table: table.to_string(),
            fixed_value: Some(fixed_value),
            key: KeyStrategy::MaxPlusOne,
            access: Access::ReadWrite,
            masked: false,
        };

        match kind {
            EntityKind::Products => read_only("vw_producto"),
            EntityKind::Cards => read_only("vw_tarjeta"),
            EntityKind::Factories => read_only("vw_fabrica"),
            EntityKind::Customers => local("cliente_carapungo", site.customer_district(role)),
            EntityKind::Branches => local("sucursal_qn", site.branch_city(role)),
            EntityKind::Employees => local("empleado_norte", site.employee_zone(role)),
        }
    }

    pub fn role(&self) -> ServiceRole {
        self.role
    }

    pub fn spec(&self, kind: EntityKind) -> &TableSpec {
        // Every kind is inserted in `new`.
        &self.specs[&kind]
    }

    pub fn specs(&self) -> impl Iterator<Item = &TableSpec> {
        EntityKind::ALL.iter().map(move |kind| self.spec(*kind))
    }

    pub fn audit_table(&self) -> &str {
        &self.audit_table
    }

    pub fn audit_user(&self) -> &str {
        &self.audit_user
    }

    /// Sequences the role draws keys from, paired with the table they cover.
    pub fn sequences(&self) -> Vec<(&str, &TableSpec)> {
        self.specs()
            .filter_map(|spec| spec.sequence_name().map(|name| (name, spec)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_writes_everything_through_sequences() {
        let catalog = Catalog::new(ServiceRole::Primary, &SiteConfig::default(), "master", false);

        assert!(catalog.specs().all(TableSpec::is_writable));
        assert_eq!(catalog.sequences().len(), 6);
        assert_eq!(catalog.spec(EntityKind::Customers).table, "cliente_chillogallo");
        assert_eq!(
            catalog.spec(EntityKind::Customers).fixed_value.as_deref(),
            Some("Chillogallo")
        );
        assert_eq!(catalog.audit_table(), "auditoria_master");
        assert!(!catalog.spec(EntityKind::Cards).masked);
    }

    #[test]
    fn replica_serves_views_read_only() {
        let catalog = Catalog::new(ServiceRole::Replica, &SiteConfig::default(), "esclavo", true);

        for kind in [EntityKind::Products, EntityKind::Cards, EntityKind::Factories] {
            assert_eq!(catalog.spec(kind).access, Access::ReadOnly);
            assert!(catalog.spec(kind).table.starts_with("vw_"));
        }
        assert_eq!(catalog.spec(EntityKind::Branches).key, KeyStrategy::MaxPlusOne);
        assert_eq!(
            catalog.spec(EntityKind::Employees).fixed_value.as_deref(),
            Some("Norte")
        );
        assert!(catalog.sequences().is_empty());
        assert!(catalog.spec(EntityKind::Cards).masked);
        assert_eq!(catalog.audit_table(), "auditoria_esclavo");
    }

    #[test]
    fn site_literals_override_defaults() {
        let site = SiteConfig {
            branch_city: Some("Cumbaya".to_string()),
            ..SiteConfig::default()
        };
        let catalog = Catalog::new(ServiceRole::Replica, &site, "esclavo", true);
        assert_eq!(
            catalog.spec(EntityKind::Branches).fixed_value.as_deref(),
            Some("Cumbaya")
        );
    }
}
