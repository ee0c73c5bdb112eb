use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use codeindex_core::{ChunkConfig, CodeIndexError, Result};
use codeindex_lens::embedding::EmbeddingGateway;
use codeindex_lens::indexer::Indexer;
use codeindex_lens::store::{discover_index, index_path_for, CodeIndex};

/// Embeds by looking up exact text, falling back to a constant vector.
struct TableEmbedder {
    table: HashMap<String, Vec<f32>>,
}

#[async_trait]
impl EmbeddingGateway for TableEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self
            .table
            .get(text)
            .cloned()
            .unwrap_or_else(|| vec![0.1, 0.1, 0.1]))
    }

    fn model_name(&self) -> &str {
        "table"
    }
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

#[tokio::test]
async fn two_file_project_with_default_chunking() {
    let dir = tempfile::tempdir().unwrap();
    let small: String = (1..=30).map(|i| format!("line number {i}\n")).collect();
    write(dir.path(), "a.py", &small);
    write(dir.path(), "b.json", &"9".repeat(5000));

    let indexer = Indexer::new(
        Arc::new(TableEmbedder {
            table: HashMap::new(),
        }),
        dir.path(),
    )
    .with_chunk_config(ChunkConfig::default());
    let stats = indexer.index_directory(dir.path(), None).await.unwrap();
    assert_eq!(stats.total_chunks, 2);
    assert_eq!(stats.total_files, 2);

    let index = CodeIndex::load(&index_path_for(dir.path())).unwrap();
    let a = &index.chunks()[0].chunk;
    assert!(a.file_path.ends_with("a.py"));
    assert_eq!((a.start_line, a.end_line), (1, 30));
    let b = &index.chunks()[1].chunk;
    assert_eq!(b.content.chars().count(), 5000);
}

#[tokio::test]
async fn identical_embedding_is_returned_first() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "auth.rs", "fn login() {}");
    write(dir.path(), "db.rs", "fn connect() {}");

    let mut table = HashMap::new();
    table.insert("fn login() {}".to_string(), vec![0.9, 0.1, 0.0]);
    table.insert("fn connect() {}".to_string(), vec![0.0, 0.2, 0.9]);
    table.insert("who handles login".to_string(), vec![0.9, 0.1, 0.0]);

    let indexer = Indexer::new(Arc::new(TableEmbedder { table }), dir.path());
    indexer.index_directory(dir.path(), None).await.unwrap();

    let hits = indexer.search("who handles login", 10).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits[0].chunk.file_path.ends_with("auth.rs"));
    assert!((hits[0].similarity - 1.0).abs() < 1e-6);
    assert!(hits[1].similarity < hits[0].similarity);
}

#[tokio::test]
async fn search_from_subdirectory_uses_project_index() {
    let dir = tempfile::tempdir().unwrap();
    let proj = dir.path().join("proj");
    write(&proj, "src/pkg/lib.rs", "pub fn answer() -> u32 { 42 }");

    let embedder = Arc::new(TableEmbedder {
        table: HashMap::new(),
    });
    Indexer::new(embedder.clone(), &proj)
        .index_directory(&proj, None)
        .await
        .unwrap();

    let start = proj.join("src/pkg");
    assert_eq!(discover_index(&start).unwrap(), proj.canonicalize().unwrap());

    let elsewhere = Indexer::new(embedder, dir.path());
    let hits = elsewhere.search_from(&start, "answer", 3).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(
        elsewhere.active_root().unwrap(),
        proj.canonicalize().unwrap()
    );
}

#[tokio::test]
async fn search_from_without_any_index_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let indexer = Indexer::new(
        Arc::new(TableEmbedder {
            table: HashMap::new(),
        }),
        dir.path(),
    );
    let err = indexer
        .search_from(dir.path(), "anything", 3)
        .await
        .unwrap_err();
    assert!(matches!(err, CodeIndexError::NotFound(_)));
}
