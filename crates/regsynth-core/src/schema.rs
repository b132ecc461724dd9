use crate::types::ColumnKind;

pub const PERSONS: &str = "persons";
pub const ADDRESSES: &str = "addresses";
pub const ADDRESS_COMPONENTS: &str = "address_components";
pub const RESIDENCIES: &str = "residencies";
pub const CITIZENSHIPS: &str = "citizenships";
pub const DRIVING_LICENSES: &str = "driving_licenses";

/// Column descriptor of a register table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub nullable: bool,
}

/// Static layout of a register table; column order is the on-disk order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSchema {
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|column| column.name).collect()
    }
}

const fn required(name: &'static str, kind: ColumnKind) -> ColumnDef {
    ColumnDef {
        name,
        kind,
        nullable: false,
    }
}

const fn nullable(name: &'static str, kind: ColumnKind) -> ColumnDef {
    ColumnDef {
        name,
        kind,
        nullable: true,
    }
}

const PERSON_COLUMNS: &[ColumnDef] = &[
    required("id", ColumnKind::Int),
    required("alive", ColumnKind::Bool),
    required("birth_date", ColumnKind::Date),
    nullable("death_date", ColumnKind::Date),
    required("gender", ColumnKind::Text),
    required("first_name", ColumnKind::Text),
    required("last_name", ColumnKind::Text),
    required("personal_code", ColumnKind::Text),
    required("main_citizenship", ColumnKind::Text),
    nullable("additional_citizenships", ColumnKind::TextList),
];

const ADDRESS_COLUMNS: &[ColumnDef] = &[
    required("id", ColumnKind::Int),
    required("catalog_code", ColumnKind::Text),
    required("component_id", ColumnKind::Int),
    required("full_text", ColumnKind::Text),
    required("postal_code", ColumnKind::Text),
    required("status", ColumnKind::Text),
    required("status_code", ColumnKind::Int),
];

const COMPONENT_COLUMNS: &[ColumnDef] = &[
    required("id", ColumnKind::Int),
    nullable("parent_id", ColumnKind::Int),
    required("code", ColumnKind::Text),
    required("label", ColumnKind::Text),
    required("level", ColumnKind::Int),
];

const RESIDENCY_COLUMNS: &[ColumnDef] = &[
    required("id", ColumnKind::Int),
    required("person_id", ColumnKind::Int),
    required("address_id", ColumnKind::Int),
    required("status", ColumnKind::Text),
    required("status_code", ColumnKind::Int),
    required("start_date", ColumnKind::Date),
    nullable("end_date", ColumnKind::Date),
];

const CITIZENSHIP_COLUMNS: &[ColumnDef] = &[
    required("id", ColumnKind::Int),
    required("person_id", ColumnKind::Int),
    required("country_code", ColumnKind::Text),
    required("role", ColumnKind::Text),
];

const LICENSE_COLUMNS: &[ColumnDef] = &[
    required("id", ColumnKind::Int),
    required("person_id", ColumnKind::Int),
    required("status", ColumnKind::Text),
    required("status_code", ColumnKind::Int),
    required("issue_date", ColumnKind::Date),
    required("expiry_date", ColumnKind::Date),
    nullable("issuing_authority", ColumnKind::Text),
];

/// Every register table, in output order.
pub const TABLES: &[TableSchema] = &[
    TableSchema {
        name: PERSONS,
        columns: PERSON_COLUMNS,
    },
    TableSchema {
        name: ADDRESS_COMPONENTS,
        columns: COMPONENT_COLUMNS,
    },
    TableSchema {
        name: ADDRESSES,
        columns: ADDRESS_COLUMNS,
    },
    TableSchema {
        name: RESIDENCIES,
        columns: RESIDENCY_COLUMNS,
    },
    TableSchema {
        name: CITIZENSHIPS,
        columns: CITIZENSHIP_COLUMNS,
    },
    TableSchema {
        name: DRIVING_LICENSES,
        columns: LICENSE_COLUMNS,
    },
];

pub fn table_schema(name: &str) -> Option<&'static TableSchema> {
    TABLES.iter().find(|table| table.name == name)
}
