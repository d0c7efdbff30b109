mod versioned_schema;

pub use versioned_schema::{
    open_versioned, prepare_connection, Column, ForeignKey, ForeignKeyOnChange, SqlType, Table,
    VersionedSchema, BASE_DB_VERSION,
};
