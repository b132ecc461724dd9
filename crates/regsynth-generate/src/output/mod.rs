pub mod csv;

pub use self::csv::{DatasetFiles, write_dataset, write_table_csv};
