use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use shapefile::{
    dbase::{self, FieldName, FieldValue, Record, TableWriter, TableWriterBuilder},
    ShapeType, ShapeWriter,
};
use thiserror::Error;
use tracing::debug;

/// Width of every character column in the attribute table.
pub const FIELD_WIDTH: u8 = 255;

// Position of the shape type in the 100 byte header shared by .shp and .shx.
const SHAPE_TYPE_OFFSET: u64 = 32;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error(transparent)]
    Shape(#[from] shapefile::Error),
    #[error(transparent)]
    Table(#[from] dbase::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("invalid field name {name:?}: {reason}")]
    InvalidFieldName { name: String, reason: String },
    #[error("duplicate field name {0:?}")]
    DuplicateField(String),
    #[error("value of {len} bytes does not fit field {field} ({} bytes wide)", FIELD_WIDTH)]
    ValueTooLong { field: usize, len: usize },
    #[error("field {field} is out of range for a table with {columns} column(s)")]
    FieldOutOfRange { field: usize, columns: usize },
    #[error("row {row} written out of order, expected row {expected}")]
    RowOutOfOrder { row: u64, expected: u64 },
    #[error("writer is already closed")]
    Closed,
}

/// Destination for the schema, attributes and points of a point dataset.
pub trait PointWriter {
    /// Declares the next string column of the attribute table.
    fn add_field(&mut self, name: &str) -> Result<(), WriteError>;

    /// Stores `value` at (`row`, `field`) of the attribute table.
    fn write_attribute(&mut self, row: u64, field: usize, value: String) -> Result<(), WriteError>;

    /// Appends a point to the geometry file, completing the current row.
    fn write_point(&mut self, point: geo_types::Point<f64>) -> Result<(), WriteError>;

    fn finish(self) -> Result<(), WriteError>
    where
        Self: Sized;
}

/// The three files making up a shapefile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub shp: PathBuf,
    pub shx: PathBuf,
    pub dbf: PathBuf,
}

impl OutputPaths {
    pub fn from_base(base: &Path) -> Self {
        OutputPaths {
            shp: with_suffix(base, "shp"),
            shx: with_suffix(base, "shx"),
            dbf: with_suffix(base, "dbf"),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        [self.shp.as_path(), self.shx.as_path(), self.dbf.as_path()].into_iter()
    }

    /// Deletes whichever of the files exist.
    pub fn remove(&self) -> io::Result<()> {
        for path in self.iter() {
            match fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "removed output"),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}

// `Path::with_extension` would replace a dot already present in the base name.
fn with_suffix(base: &Path, extension: &str) -> PathBuf {
    let mut path = OsString::from(base.as_os_str());
    path.push(".");
    path.push(extension);
    PathBuf::from(path)
}

enum Table {
    Declaring {
        builder: TableWriterBuilder,
        dest: BufWriter<File>,
    },
    Writing(TableWriter<BufWriter<File>>),
    Closed,
}

/// [`PointWriter`] producing an ESRI shapefile.
///
/// The attribute table header can only be written once every column is
/// known, so columns are collected until the first attribute or point
/// arrives. Attributes of the row being assembled are held until its point
/// is written.
pub struct ShapefileWriter {
    paths: OutputPaths,
    shape_writer: ShapeWriter<BufWriter<File>>,
    table: Table,
    names: Vec<String>,
    row: Vec<Option<String>>,
    rows_written: u64,
}

impl ShapefileWriter {
    pub fn create(paths: &OutputPaths) -> Result<ShapefileWriter, crate::Error> {
        let create = |path: &Path| {
            File::create(path)
                .map(BufWriter::new)
                .map_err(|err| crate::Error::io("create", path, err))
        };
        let shp = create(&paths.shp)?;
        let shx = create(&paths.shx)?;
        let dbf = create(&paths.dbf)?;

        Ok(ShapefileWriter {
            paths: paths.clone(),
            shape_writer: ShapeWriter::with_shx(shp, shx),
            table: Table::Declaring {
                builder: TableWriterBuilder::new(),
                dest: dbf,
            },
            names: Vec::new(),
            row: Vec::new(),
            rows_written: 0,
        })
    }

    fn table_writer(&mut self) -> Result<&mut TableWriter<BufWriter<File>>, WriteError> {
        self.table = match std::mem::replace(&mut self.table, Table::Closed) {
            Table::Declaring { builder, dest } => {
                debug!(columns = self.names.len(), "attribute schema complete");
                Table::Writing(builder.build_with_dest(dest))
            }
            other => other,
        };
        match &mut self.table {
            Table::Writing(writer) => Ok(writer),
            _ => Err(WriteError::Closed),
        }
    }
}

impl PointWriter for ShapefileWriter {
    fn add_field(&mut self, name: &str) -> Result<(), WriteError> {
        let builder = match &mut self.table {
            Table::Declaring { builder, .. } => builder,
            _ => return Err(WriteError::Closed),
        };
        if self.names.iter().any(|existing| existing == name) {
            return Err(WriteError::DuplicateField(name.to_string()));
        }
        let field_name = FieldName::try_from(name).map_err(|err| WriteError::InvalidFieldName {
            name: name.to_string(),
            reason: err.to_string(),
        })?;

        *builder = std::mem::replace(builder, TableWriterBuilder::new())
            .add_character_field(field_name, FIELD_WIDTH);
        self.names.push(name.to_string());
        Ok(())
    }

    fn write_attribute(&mut self, row: u64, field: usize, value: String) -> Result<(), WriteError> {
        if row != self.rows_written {
            return Err(WriteError::RowOutOfOrder {
                row,
                expected: self.rows_written,
            });
        }
        if field >= self.names.len() {
            return Err(WriteError::FieldOutOfRange {
                field,
                columns: self.names.len(),
            });
        }
        if value.len() > FIELD_WIDTH as usize {
            return Err(WriteError::ValueTooLong {
                field,
                len: value.len(),
            });
        }
        if self.row.len() < self.names.len() {
            self.row.resize(self.names.len(), None);
        }
        self.row[field] = Some(value);
        Ok(())
    }

    fn write_point(&mut self, point: geo_types::Point<f64>) -> Result<(), WriteError> {
        let shape = shapefile::Point::from(point);
        self.shape_writer.write_shape(&shape)?;

        let mut record = Record::default();
        let mut values = std::mem::take(&mut self.row).into_iter();
        for name in &self.names {
            let value = values.next().flatten();
            record.insert(name.clone(), FieldValue::Character(value));
        }
        self.table_writer()?.write_record(&record)?;
        self.rows_written += 1;
        Ok(())
    }

    fn finish(mut self) -> Result<(), WriteError> {
        // Header-only input still needs a table header on disk.
        self.table_writer()?;
        debug!(rows = self.rows_written, "closing shapefile");

        let ShapefileWriter {
            paths,
            shape_writer,
            table,
            rows_written,
            ..
        } = self;
        // Both writers rewrite their headers with the final counts when dropped.
        drop(table);
        drop(shape_writer);

        // Without a shape the writer cannot know the type and records a null shape.
        if rows_written == 0 {
            write_point_shape_type(&paths.shp)?;
            write_point_shape_type(&paths.shx)?;
        }
        Ok(())
    }
}

fn write_point_shape_type(path: &Path) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).open(path)?;
    file.seek(SeekFrom::Start(SHAPE_TYPE_OFFSET))?;
    file.write_all(&(ShapeType::Point as i32).to_le_bytes())?;
    file.sync_all()
}
