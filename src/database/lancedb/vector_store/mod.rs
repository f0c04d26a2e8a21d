
use super::CodeRecord;
use crate::embeddings::CodeChunk;
use crate::{RagError, config::Config};
use arrow::array::{Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use itertools::Itertools;
use lancedb::{
    Connection, Table,
    query::{ExecutableQuery, QueryBase, Select},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// The `code_chunks` table in a LanceDB directory
pub struct CodeStore {
    connection: Connection,
    db_path: PathBuf,
    table_name: String,
    vector_dimension: usize,
}

/// A row returned by nearest-neighbour search
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMatch {
    pub filename: String,
    pub text: String,
    /// Distance reported by LanceDB (L2 by default), smaller is closer
    pub distance: f32,
}

impl CodeStore {
    /// Open the store for writing, creating the database directory and table if needed.
    ///
    /// An existing table is reused as-is, so repeated runs append rows.
    #[inline]
    pub async fn open_or_create(config: &Config) -> Result<Self, RagError> {
        let db_path = config.database_path();
        debug!("Initializing LanceDB at path: {:?}", db_path);

        std::fs::create_dir_all(&db_path).map_err(|e| {
            RagError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        let store = Self::connect(config, db_path).await?;

        if store.table_exists().await? {
            info!("Using existing table '{}'", store.table_name);
            store.check_existing_dimension().await?;
        } else {
            store.create_table().await?;
            info!(
                "Created table '{}' with {} dimensions",
                store.table_name, store.vector_dimension
            );
        }

        Ok(store)
    }

    /// Open an existing store for reading.
    ///
    /// Fails with [`RagError::DatabaseMissing`] or [`RagError::TableMissing`]
    /// when nothing has been indexed yet.
    #[inline]
    pub async fn open(config: &Config) -> Result<Self, RagError> {
        let db_path = config.database_path();
        if !db_path.exists() {
            return Err(RagError::DatabaseMissing(db_path));
        }

        let store = Self::connect(config, db_path).await?;
        if !store.table_exists().await? {
            return Err(RagError::TableMissing(store.table_name));
        }

        Ok(store)
    }

    async fn connect(config: &Config, db_path: PathBuf) -> Result<Self, RagError> {
        let uri = db_path.to_string_lossy().into_owned();
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        Ok(Self {
            connection,
            db_path,
            table_name: config.database.table_name.clone(),
            vector_dimension: config.ollama.embedding_dimension as usize,
        })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    #[inline]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    async fn table_exists(&self) -> Result<bool, RagError> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to list tables: {}", e)))?;

        Ok(table_names.contains(&self.table_name))
    }

    async fn create_table(&self) -> Result<(), RagError> {
        let schema = self.create_schema();
        self.connection
            .create_empty_table(&self.table_name, schema)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to create table: {}", e)))?;
        Ok(())
    }

    async fn open_table(&self) -> Result<Table, RagError> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to open table: {}", e)))
    }

    /// The stored vector width must match the configured embedding model
    async fn check_existing_dimension(&self) -> Result<(), RagError> {
        let schema = self
            .open_table()
            .await?
            .schema()
            .await
            .map_err(|e| RagError::Database(format!("Failed to get table schema: {}", e)))?;

        let existing = schema.fields().iter().find_map(|field| {
            match (field.name().as_str(), field.data_type()) {
                ("vector", DataType::FixedSizeList(_, size)) => Some(*size as usize),
                _ => None,
            }
        });

        match existing {
            Some(dim) if dim == self.vector_dimension => Ok(()),
            Some(dim) => Err(RagError::Database(format!(
                "Table '{}' stores {}-dimensional vectors but the embedding model is configured for {}",
                self.table_name, dim, self.vector_dimension
            ))),
            None => Err(RagError::Database(
                "Could not find vector column or determine dimension".to_string(),
            )),
        }
    }

    fn create_schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("filename", DataType::Utf8, false),
            Field::new("text", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    self.vector_dimension as i32,
                ),
                false,
            ),
        ]))
    }

    /// Append a single record
    #[inline]
    pub async fn add_record(&self, record: CodeRecord) -> Result<(), RagError> {
        self.add_records(&[record]).await
    }

    /// Append records in one write. Every vector must have the configured dimension.
    #[inline]
    pub async fn add_records(&self, records: &[CodeRecord]) -> Result<(), RagError> {
        if records.is_empty() {
            debug!("No records to store");
            return Ok(());
        }

        if let Some(bad) = records
            .iter()
            .find(|r| r.vector.len() != self.vector_dimension)
        {
            return Err(RagError::Database(format!(
                "Refusing to store {}-dimensional vector for {} (expected {})",
                bad.vector.len(),
                bad.filename,
                self.vector_dimension
            )));
        }

        let record_batch = self.create_record_batch(records)?;
        let table = self.open_table().await?;

        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to insert records: {}", e)))?;

        debug!("Stored {} records", records.len());
        Ok(())
    }

    fn create_record_batch(&self, records: &[CodeRecord]) -> Result<RecordBatch, RagError> {
        let filenames: Vec<&str> = records.iter().map(|r| r.filename.as_str()).collect();
        let texts: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();

        let mut flat_values = Vec::with_capacity(records.len() * self.vector_dimension);
        for record in records {
            flat_values.extend_from_slice(&record.vector);
        }
        let values_array = Float32Array::from(flat_values);
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let vector_array = FixedSizeListArray::try_new(
            field,
            self.vector_dimension as i32,
            Arc::new(values_array),
            None,
        )
        .map_err(|e| RagError::Database(format!("Failed to create vector array: {}", e)))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(filenames)),
            Arc::new(StringArray::from(texts)),
            Arc::new(vector_array),
        ];

        RecordBatch::try_new(self.create_schema(), arrays)
            .map_err(|e| RagError::Database(format!("Failed to create record batch: {}", e)))
    }

    /// Find the `limit` records closest to `query_vector`
    #[inline]
    pub async fn search(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<StoredMatch>, RagError> {
        debug!("Searching for similar vectors with limit: {}", limit);

        let table = self.open_table().await?;
        let results = table
            .vector_search(query_vector)
            .map_err(|e| RagError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .limit(limit)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to execute search: {}", e)))?;

        let batches: Vec<RecordBatch> = results
            .try_collect()
            .await
            .map_err(|e| RagError::Database(format!("Failed to read result stream: {}", e)))?;

        let mut matches = Vec::new();
        for batch in &batches {
            matches.extend(parse_search_batch(batch)?);
        }

        debug!("Parsed {} search results", matches.len());
        Ok(matches)
    }

    /// Total number of stored chunks
    #[inline]
    pub async fn count_rows(&self) -> Result<usize, RagError> {
        self.open_table()
            .await?
            .count_rows(None)
            .await
            .map_err(|e| RagError::Database(format!("Failed to count rows: {}", e)))
    }

    /// Chunk count per distinct filename, sorted by filename
    #[inline]
    pub async fn file_chunk_counts(&self) -> Result<Vec<(String, usize)>, RagError> {
        let batches = self
            .scan(Select::Columns(vec!["filename".to_string()]), None)
            .await?;

        let mut filenames = Vec::new();
        for batch in &batches {
            let column = string_column(batch, "filename")?;
            filenames.extend((0..batch.num_rows()).map(|row| column.value(row).to_string()));
        }

        Ok(filenames
            .into_iter()
            .counts()
            .into_iter()
            .sorted()
            .collect())
    }

    /// Any one stored chunk, or `None` when the table is empty
    #[inline]
    pub async fn sample_chunk(&self) -> Result<Option<CodeChunk>, RagError> {
        let batches = self
            .scan(
                Select::Columns(vec!["filename".to_string(), "text".to_string()]),
                Some(1),
            )
            .await?;

        for batch in &batches {
            if batch.num_rows() == 0 {
                continue;
            }
            let filenames = string_column(batch, "filename")?;
            let texts = string_column(batch, "text")?;
            return Ok(Some(CodeChunk {
                filename: filenames.value(0).to_string(),
                text: texts.value(0).to_string(),
            }));
        }

        Ok(None)
    }

    async fn scan(&self, select: Select, limit: Option<usize>) -> Result<Vec<RecordBatch>, RagError> {
        let table = self.open_table().await?;
        let mut query = table.query().select(select);
        if let Some(limit) = limit {
            query = query.limit(limit);
        }

        query
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to scan table: {}", e)))?
            .try_collect()
            .await
            .map_err(|e| RagError::Database(format!("Failed to read table: {}", e)))
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, RagError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| RagError::Database(format!("Invalid {} column type", name)))
}

fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<StoredMatch>, RagError> {
    let filenames = string_column(batch, "filename")?;
    let texts = string_column(batch, "text")?;
    let distances = batch
        .column_by_name("_distance")
        .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

    Ok((0..batch.num_rows())
        .map(|row| StoredMatch {
            filename: filenames.value(row).to_string(),
            text: texts.value(row).to_string(),
            distance: distances.map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) }),
        })
        .collect())
}
