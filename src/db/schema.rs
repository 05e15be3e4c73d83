// Table definitions shared by both backends. The statements only use types
// PostgreSQL and SQLite agree on: BIGINT keys, TEXT, DOUBLE PRECISION.

use super::catalog::{Catalog, KEY_SEQUENCES_TABLE};
use super::models::EntityKind;

fn entity_columns(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Products => {
            "id_producto BIGINT PRIMARY KEY, nombre TEXT NOT NULL, precio DOUBLE PRECISION NOT NULL"
        }
        EntityKind::Customers => {
            "id_cliente BIGINT PRIMARY KEY, nombre TEXT NOT NULL, direccion TEXT, telefono TEXT"
        }
        EntityKind::Branches => {
            "id_sucursal BIGINT PRIMARY KEY, nombre TEXT NOT NULL, ciudad TEXT, direccion TEXT"
        }
        EntityKind::Employees => {
            "id_empleado BIGINT PRIMARY KEY, nombre TEXT NOT NULL, sucursal TEXT, cargo TEXT"
        }
        EntityKind::Cards => "id_tarjeta BIGINT PRIMARY KEY, tipo TEXT NOT NULL, numero TEXT",
        EntityKind::Factories => {
            "id_fabrica BIGINT PRIMARY KEY, nombre TEXT NOT NULL, pais TEXT"
        }
    }
}

/// `CREATE TABLE IF NOT EXISTS` statements for every table the role touches.
pub fn bootstrap_statements(catalog: &Catalog) -> Vec<String> {
    let mut statements: Vec<String> = catalog
        .specs()
        .map(|spec| {
            format!(
                "CREATE TABLE IF NOT EXISTS {} ({})",
                spec.table,
                entity_columns(spec.kind)
            )
        })
        .collect();

    statements.push(format!(
        "CREATE TABLE IF NOT EXISTS {} (\
         id_auditoria BIGINT PRIMARY KEY, \
         user_name TEXT NOT NULL, \
         fecha TEXT NOT NULL, \
         tipo_operacion TEXT NOT NULL, \
         nombre_table TEXT NOT NULL, \
         anterior TEXT, \
         nuevo TEXT)",
        catalog.audit_table()
    ));
    statements.push(format!(
        "CREATE INDEX IF NOT EXISTS idx_{0}_nombre_table ON {0}(nombre_table)",
        catalog.audit_table()
    ));
    statements.push(format!(
        "CREATE TABLE IF NOT EXISTS {KEY_SEQUENCES_TABLE} (\
         name TEXT PRIMARY KEY, \
         next_value BIGINT NOT NULL)"
    ));

    statements
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ServiceRole, SiteConfig};

    #[test]
    fn bootstrap_covers_entities_audit_and_sequences() {
        let catalog = Catalog::new(ServiceRole::Replica, &SiteConfig::default(), "esclavo", true);
        let statements = bootstrap_statements(&catalog);

        assert_eq!(statements.len(), 9);
        assert!(statements.iter().any(|s| s.contains("vw_tarjeta (id_tarjeta BIGINT")));
        assert!(statements.iter().any(|s| s.contains("auditoria_esclavo (id_auditoria")));
        assert!(statements.iter().any(|s| s.contains("key_sequences")));
    }
}
