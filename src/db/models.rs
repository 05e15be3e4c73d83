use std::fmt;

use diesel::QueryableByName;
use diesel::sql_types::{BigInt, Double, Nullable, Text};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::sql::{Row, SqlValue};
use crate::utils::masking::mask_card_number;

/// The CRUD entities exposed under `/api/{entity}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Products,
    Customers,
    Branches,
    Employees,
    Cards,
    Factories,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Products,
        EntityKind::Customers,
        EntityKind::Branches,
        EntityKind::Employees,
        EntityKind::Cards,
        EntityKind::Factories,
    ];

    /// Accepts the route names the frontend has always used plus English ones.
    pub fn from_route(segment: &str) -> Option<Self> {
        match segment {
            "products" | "productos" => Some(EntityKind::Products),
            "customers" | "clientes" => Some(EntityKind::Customers),
            "sucursales" | "branches" => Some(EntityKind::Branches),
            "empleados" | "employees" => Some(EntityKind::Employees),
            "tarjetas" | "cards" => Some(EntityKind::Cards),
            "fabricas" | "factories" => Some(EntityKind::Factories),
            _ => None,
        }
    }

    pub fn singular(&self) -> &'static str {
        match self {
            EntityKind::Products => "product",
            EntityKind::Customers => "customer",
            EntityKind::Branches => "branch",
            EntityKind::Employees => "employee",
            EntityKind::Cards => "card",
            EntityKind::Factories => "factory",
        }
    }

    pub const fn id_column(&self) -> &'static str {
        match self {
            EntityKind::Products => "id_producto",
            EntityKind::Customers => "id_cliente",
            EntityKind::Branches => "id_sucursal",
            EntityKind::Employees => "id_empleado",
            EntityKind::Cards => "id_tarjeta",
            EntityKind::Factories => "id_fabrica",
        }
    }

    pub fn plural(&self) -> &'static str {
        match self {
            EntityKind::Products => "products",
            EntityKind::Customers => "customers",
            EntityKind::Branches => "branches",
            EntityKind::Employees => "employees",
            EntityKind::Cards => "cards",
            EntityKind::Factories => "factories",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.plural())
    }
}

/// A table row served by the generic record store.
///
/// `COLUMNS` is the select list; its first entry is `ID_COLUMN`.
pub trait Entity: Row + Serialize + Clone + Sync {
    const KIND: EntityKind;
    const ID_COLUMN: &'static str = Self::KIND.id_column();
    const COLUMNS: &'static [&'static str];
    /// Column stamped with the site literal on insert, if any.
    const FIXED_COLUMN: Option<&'static str> = None;

    type Draft: Draft;

    /// Hides sensitive fields before the row leaves the server.
    fn redact(&mut self) {}
}

/// The client-supplied fields of an entity, as posted to create or update it.
pub trait Draft: DeserializeOwned + Send + Sync + 'static {
    /// Editable columns, in the order `values` binds them.
    const COLUMNS: &'static [&'static str];

    fn values(&self) -> Vec<SqlValue>;

    fn validate(&self) -> Result<(), String>;
}

fn require(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{field} cannot be empty"))
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, QueryableByName)]
pub struct Product {
    #[serde(rename = "ID_PRODUCTO")]
    #[diesel(sql_type = BigInt, column_name = id_producto)]
    pub id: i64,
    #[serde(rename = "NOMBRE")]
    #[diesel(sql_type = Text, column_name = nombre)]
    pub name: String,
    #[serde(rename = "PRECIO")]
    #[diesel(sql_type = Double, column_name = precio)]
    pub price: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductDraft {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "precio")]
    pub price: f64,
}

impl Entity for Product {
    const KIND: EntityKind = EntityKind::Products;
    const COLUMNS: &'static [&'static str] = &["id_producto", "nombre", "precio"];
    type Draft = ProductDraft;
}

impl Draft for ProductDraft {
    const COLUMNS: &'static [&'static str] = &["nombre", "precio"];

    fn values(&self) -> Vec<SqlValue> {
        vec![self.name.clone().into(), self.price.into()]
    }

    fn validate(&self) -> Result<(), String> {
        require("nombre", &self.name)?;
        if !self.price.is_finite() || self.price < 0.0 {
            return Err("precio must be a non-negative number".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, QueryableByName)]
pub struct Customer {
    #[serde(rename = "ID_CLIENTE")]
    #[diesel(sql_type = BigInt, column_name = id_cliente)]
    pub id: i64,
    #[serde(rename = "NOMBRE")]
    #[diesel(sql_type = Text, column_name = nombre)]
    pub name: String,
    #[serde(rename = "DIRECCION")]
    #[diesel(sql_type = Nullable<Text>, column_name = direccion)]
    pub district: Option<String>,
    #[serde(rename = "TELEFONO")]
    #[diesel(sql_type = Nullable<Text>, column_name = telefono)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerDraft {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "telefono")]
    pub phone: String,
}

impl Entity for Customer {
    const KIND: EntityKind = EntityKind::Customers;
    const COLUMNS: &'static [&'static str] = &["id_cliente", "nombre", "direccion", "telefono"];
    const FIXED_COLUMN: Option<&'static str> = Some("direccion");
    type Draft = CustomerDraft;
}

impl Draft for CustomerDraft {
    const COLUMNS: &'static [&'static str] = &["nombre", "telefono"];

    fn values(&self) -> Vec<SqlValue> {
        vec![self.name.clone().into(), self.phone.clone().into()]
    }

    fn validate(&self) -> Result<(), String> {
        require("nombre", &self.name)?;
        require("telefono", &self.phone)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, QueryableByName)]
pub struct Branch {
    #[serde(rename = "ID_SUCURSAL")]
    #[diesel(sql_type = BigInt, column_name = id_sucursal)]
    pub id: i64,
    #[serde(rename = "NOMBRE")]
    #[diesel(sql_type = Text, column_name = nombre)]
    pub name: String,
    #[serde(rename = "CIUDAD")]
    #[diesel(sql_type = Nullable<Text>, column_name = ciudad)]
    pub city: Option<String>,
    #[serde(rename = "DIRECCION")]
    #[diesel(sql_type = Nullable<Text>, column_name = direccion)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BranchDraft {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "direccion", default)]
    pub address: Option<String>,
}

impl Entity for Branch {
    const KIND: EntityKind = EntityKind::Branches;
    const COLUMNS: &'static [&'static str] = &["id_sucursal", "nombre", "ciudad", "direccion"];
    const FIXED_COLUMN: Option<&'static str> = Some("ciudad");
    type Draft = BranchDraft;
}

impl Draft for BranchDraft {
    const COLUMNS: &'static [&'static str] = &["nombre", "direccion"];

    fn values(&self) -> Vec<SqlValue> {
        vec![self.name.clone().into(), self.address.clone().into()]
    }

    fn validate(&self) -> Result<(), String> {
        require("nombre", &self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, QueryableByName)]
pub struct Employee {
    #[serde(rename = "ID_EMPLEADO")]
    #[diesel(sql_type = BigInt, column_name = id_empleado)]
    pub id: i64,
    #[serde(rename = "NOMBRE")]
    #[diesel(sql_type = Text, column_name = nombre)]
    pub name: String,
    #[serde(rename = "SUCURSAL")]
    #[diesel(sql_type = Nullable<Text>, column_name = sucursal)]
    pub zone: Option<String>,
    #[serde(rename = "CARGO")]
    #[diesel(sql_type = Nullable<Text>, column_name = cargo)]
    pub position: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmployeeDraft {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "cargo")]
    pub position: String,
}

impl Entity for Employee {
    const KIND: EntityKind = EntityKind::Employees;
    const COLUMNS: &'static [&'static str] = &["id_empleado", "nombre", "sucursal", "cargo"];
    const FIXED_COLUMN: Option<&'static str> = Some("sucursal");
    type Draft = EmployeeDraft;
}

impl Draft for EmployeeDraft {
    const COLUMNS: &'static [&'static str] = &["nombre", "cargo"];

    fn values(&self) -> Vec<SqlValue> {
        vec![self.name.clone().into(), self.position.clone().into()]
    }

    fn validate(&self) -> Result<(), String> {
        require("nombre", &self.name)?;
        require("cargo", &self.position)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, QueryableByName)]
pub struct Card {
    #[serde(rename = "ID_TARJETA")]
    #[diesel(sql_type = BigInt, column_name = id_tarjeta)]
    pub id: i64,
    #[serde(rename = "TIPO")]
    #[diesel(sql_type = Text, column_name = tipo)]
    pub kind: String,
    #[serde(rename = "NUMERO")]
    #[diesel(sql_type = Nullable<Text>, column_name = numero)]
    pub number: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CardDraft {
    #[serde(rename = "tipo")]
    pub kind: String,
    #[serde(rename = "numero", deserialize_with = "card_number")]
    pub number: String,
}

/// Card numbers arrive either as JSON strings or as bare numbers.
fn card_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

impl Entity for Card {
    const KIND: EntityKind = EntityKind::Cards;
    const COLUMNS: &'static [&'static str] = &["id_tarjeta", "tipo", "numero"];
    type Draft = CardDraft;

    fn redact(&mut self) {
        self.number = Some(mask_card_number(self.number.as_deref()));
    }
}

impl Draft for CardDraft {
    const COLUMNS: &'static [&'static str] = &["tipo", "numero"];

    fn values(&self) -> Vec<SqlValue> {
        vec![self.kind.clone().into(), self.number.clone().into()]
    }

    fn validate(&self) -> Result<(), String> {
        require("tipo", &self.kind)?;
        require("numero", &self.number)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, QueryableByName)]
pub struct Factory {
    #[serde(rename = "ID_FABRICA")]
    #[diesel(sql_type = BigInt, column_name = id_fabrica)]
    pub id: i64,
    #[serde(rename = "NOMBRE")]
    #[diesel(sql_type = Text, column_name = nombre)]
    pub name: String,
    #[serde(rename = "PAIS")]
    #[diesel(sql_type = Nullable<Text>, column_name = pais)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FactoryDraft {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "pais")]
    pub country: String,
}

impl Entity for Factory {
    const KIND: EntityKind = EntityKind::Factories;
    const COLUMNS: &'static [&'static str] = &["id_fabrica", "nombre", "pais"];
    type Draft = FactoryDraft;
}

impl Draft for FactoryDraft {
    const COLUMNS: &'static [&'static str] = &["nombre", "pais"];

    fn values(&self) -> Vec<SqlValue> {
        vec![self.name.clone().into(), self.country.clone().into()]
    }

    fn validate(&self) -> Result<(), String> {
        require("nombre", &self.name)?;
        require("pais", &self.country)
    }
}

/// One row of the audit trail written alongside every DML statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, QueryableByName)]
pub struct AuditEntry {
    #[serde(rename = "ID_AUDITORIA")]
    #[diesel(sql_type = BigInt, column_name = id_auditoria)]
    pub id: i64,
    #[serde(rename = "USER_NAME")]
    #[diesel(sql_type = Text, column_name = user_name)]
    pub user_name: String,
    #[serde(rename = "FECHA")]
    #[diesel(sql_type = Text, column_name = fecha)]
    pub performed_at: String,
    #[serde(rename = "TIPO_OPERACION")]
    #[diesel(sql_type = Text, column_name = tipo_operacion)]
    pub operation: String,
    #[serde(rename = "NOMBRE_TABLE")]
    #[diesel(sql_type = Text, column_name = nombre_table)]
    pub table_name: String,
    #[serde(rename = "ANTERIOR")]
    #[diesel(sql_type = Nullable<Text>, column_name = anterior)]
    pub previous: Option<String>,
    #[serde(rename = "NUEVO")]
    #[diesel(sql_type = Nullable<Text>, column_name = nuevo)]
    pub current: Option<String>,
}

impl AuditEntry {
    pub const COLUMNS: &'static [&'static str] = &[
        "id_auditoria",
        "user_name",
        "fecha",
        "tipo_operacion",
        "nombre_table",
        "anterior",
        "nuevo",
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditOperation {
    Insert,
    Update,
    Delete,
}

impl AuditOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditOperation::Insert => "INSERT",
            AuditOperation::Update => "UPDATE",
            AuditOperation::Delete => "DELETE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_serialize_with_column_names() {
        let product = Product {
            id: 3,
            name: "Leche".to_string(),
            price: 1.25,
        };
        let value = serde_json::to_value(&product).unwrap();
        assert_eq!(value["ID_PRODUCTO"], 3);
        assert_eq!(value["NOMBRE"], "Leche");
        assert_eq!(value["PRECIO"], 1.25);
    }

    #[test]
    fn drafts_read_frontend_field_names() {
        let draft: BranchDraft = serde_json::from_str(r#"{"nombre":"Centro"}"#).unwrap();
        assert_eq!(draft.name, "Centro");
        assert_eq!(draft.address, None);
        assert_eq!(
            draft.values(),
            vec![SqlValue::Text("Centro".into()), SqlValue::NullableText(None)]
        );
    }

    #[test]
    fn card_draft_accepts_numeric_number() {
        let draft: CardDraft =
            serde_json::from_str(r#"{"tipo":"VISA","numero":4111111111111111}"#).unwrap();
        assert_eq!(draft.number, "4111111111111111");
    }

    #[test]
    fn card_redaction_keeps_last_four_digits() {
        let mut card = Card {
            id: 1,
            kind: "VISA".to_string(),
            number: Some("4111111111111234".to_string()),
        };
        card.redact();
        assert_eq!(card.number.as_deref(), Some("****-****-****-1234"));
    }

    #[test]
    fn draft_validation_rejects_blank_and_negative_values() {
        let blank = CustomerDraft {
            name: "  ".to_string(),
            phone: "099".to_string(),
        };
        assert!(blank.validate().is_err());

        let negative = ProductDraft {
            name: "Pan".to_string(),
            price: -1.0,
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn select_lists_start_with_the_key_column() {
        fn check<E: Entity>() {
            assert_eq!(E::COLUMNS[0], E::ID_COLUMN, "{}", E::KIND);
        }
        check::<Product>();
        check::<Customer>();
        check::<Branch>();
        check::<Employee>();
        check::<Card>();
        check::<Factory>();
    }

    #[test]
    fn route_names_resolve_to_entities() {
        assert_eq!(EntityKind::from_route("sucursales"), Some(EntityKind::Branches));
        assert_eq!(EntityKind::from_route("cards"), Some(EntityKind::Cards));
        assert_eq!(EntityKind::from_route("auditoria"), None);
    }
}
