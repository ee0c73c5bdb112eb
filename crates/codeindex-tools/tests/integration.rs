use std::path::Path;
use std::sync::Arc;

use codeindex_core::SearchConfig;
use codeindex_lens::indexer::Indexer;
use codeindex_lens::mock::HashEmbedder;
use codeindex_tools::tools::{CodeIndexTools, IndexDirectoryParams, SearchCodeParams, ToolResponse};

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn tools(working_dir: &Path) -> CodeIndexTools {
    let indexer = Indexer::new(Arc::new(HashEmbedder::new(128)), working_dir);
    CodeIndexTools::new(Arc::new(indexer), None, SearchConfig::default()).with_working_dir(working_dir)
}

fn payload(response: &ToolResponse) -> serde_json::Value {
    assert!(!response.is_error, "{}", response.text);
    serde_json::from_str(&response.text).unwrap()
}

#[tokio::test]
async fn index_once_then_search_from_a_fresh_process_in_a_subdirectory() {
    let project = tempfile::tempdir().unwrap();
    write(
        project.path(),
        "pkg/cache/lru.go",
        "func (c *Cache) Evict() {\n\tc.evictOldest()\n}\n",
    );
    write(
        project.path(),
        "pkg/http/server.go",
        "func Serve(addr string) error {\n\treturn listen(addr)\n}\n",
    );

    let builder = tools(project.path());
    let built = payload(
        &builder
            .index_directory(IndexDirectoryParams {
                path: Some(project.path().display().to_string()),
            })
            .await,
    );
    assert_eq!(built["stats"]["totalFiles"], 2);
    assert!(project.path().join(".codeindex/index.json").is_file());

    // A second tool instance starting deeper in the tree finds the same index.
    let nested = project.path().join("pkg/cache");
    let searcher = tools(&nested);
    let response = searcher
        .search_code(SearchCodeParams {
            query: Some("cache evict oldest".into()),
            ..Default::default()
        })
        .await;
    assert!(!response.is_error, "{}", response.text);
    assert!(response.text.contains("lru.go (lines 1-3)"));
    assert!(!response.text.contains("server.go"));

    let stats = payload(&searcher.index_stats().await);
    assert_eq!(stats["totalChunks"], 2);
    assert_eq!(stats["modelName"], "mock-hash");
}

#[tokio::test]
async fn snippets_can_be_truncated() {
    let project = tempfile::tempdir().unwrap();
    let body: String = (0..40).map(|i| format!("let value_{i} = compute_{i}();\n")).collect();
    write(project.path(), "src/values.rs", &body);

    let tools = tools(project.path());
    tools
        .index_directory(IndexDirectoryParams {
            path: Some(".".into()),
        })
        .await;

    let response = tools
        .search_code(SearchCodeParams {
            query: Some("let value compute".into()),
            min_similarity: Some(0.0),
            max_content_length: Some(30),
            ..Default::default()
        })
        .await;
    assert!(!response.is_error, "{}", response.text);
    assert!(response.text.contains("... [truncated]"));
}
