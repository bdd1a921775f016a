//! Integration tests for the build pipeline
//!
//! Tests use temporary directories and stub compilers to verify:
//! - Document rewriting around compiled blocks
//! - Preserve-original-markup fallback for every per-block failure
//! - Failure isolation between concurrently processed blocks
//! - Inline mode, explicit output paths, and source removal

use async_trait::async_trait;
use minblock_core::processor::{CSS_PATTERN, JS_PATTERN};
use minblock_core::{
    BlockError, BlockState, Compiler, Error, ProcessorRegistry, RegexBlockProcessor,
};
use minblock_runtime::error::{core_error, is_structural};
use minblock_runtime::{Pipeline, Settings};
use rstest::rstest;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Barrier;

// =============================================================================
// Stub compilers
// =============================================================================

/// Returns fixed bytes for any input
struct LiteralCompiler(&'static str);

#[async_trait]
impl Compiler for LiteralCompiler {
    fn name(&self) -> &str {
        "literal"
    }

    async fn compile(&self, _source: Vec<u8>) -> minblock_core::Result<Vec<u8>> {
        Ok(self.0.as_bytes().to_vec())
    }
}

/// Always fails
struct FailingCompiler;

#[async_trait]
impl Compiler for FailingCompiler {
    fn name(&self) -> &str {
        "failing"
    }

    async fn compile(&self, _source: Vec<u8>) -> minblock_core::Result<Vec<u8>> {
        Err(Error::Compiler {
            compiler: "failing".to_string(),
            message: "service unavailable".to_string(),
        })
    }
}

/// Uppercases its input, failing when the source contains `FAIL`
struct SelectiveCompiler;

#[async_trait]
impl Compiler for SelectiveCompiler {
    fn name(&self) -> &str {
        "selective"
    }

    async fn compile(&self, source: Vec<u8>) -> minblock_core::Result<Vec<u8>> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        if source.windows(4).any(|w| w == b"FAIL") {
            return Err(Error::Compiler {
                compiler: "selective".to_string(),
                message: "instrumented failure".to_string(),
            });
        }
        Ok(source.to_ascii_uppercase())
    }
}

/// Completes only once `n` compilations are in flight at the same time
struct BarrierCompiler(Barrier);

#[async_trait]
impl Compiler for BarrierCompiler {
    fn name(&self) -> &str {
        "barrier"
    }

    async fn compile(&self, source: Vec<u8>) -> minblock_core::Result<Vec<u8>> {
        self.0.wait().await;
        Ok(source)
    }
}

/// Panics when the source contains `PANIC`
struct PanickingCompiler;

#[async_trait]
impl Compiler for PanickingCompiler {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn compile(&self, source: Vec<u8>) -> minblock_core::Result<Vec<u8>> {
        if source.windows(5).any(|w| w == b"PANIC") {
            panic!("compiler bug");
        }
        Ok(source)
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn ref_registry(compiler: Arc<dyn Compiler>) -> ProcessorRegistry {
    let mut registry = ProcessorRegistry::new();
    registry.register(
        RegexBlockProcessor::new(
            "js",
            JS_PATTERN,
            "REF({{ file }})",
            "INLINE({{ content }})",
            compiler.clone(),
        )
        .unwrap(),
    );
    registry.register(
        RegexBlockProcessor::new(
            "css",
            CSS_PATTERN,
            "CSSREF({{ file }})",
            "STYLE({{ content }})",
            compiler,
        )
        .unwrap(),
    );
    registry
}

fn write(dir: &Path, name: &str, contents: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

fn read(dir: &Path, name: &str) -> String {
    std::fs::read_to_string(dir.join(name)).unwrap()
}

fn pipeline(dir: &TempDir, compiler: Arc<dyn Compiler>) -> Pipeline {
    Pipeline::new(Settings::new(dir.path()), ref_registry(compiler))
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_single_block_replaced_and_artifact_written() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "index.html",
        "A<!-- build:js out.js -->x<!-- endbuild -->B",
    );

    let report = pipeline(&dir, Arc::new(LiteralCompiler("MIN")))
        .run(dir.path().join("index.html"))
        .await
        .unwrap();

    assert_eq!(read(dir.path(), "index.html"), "AREF(out.js)B");
    assert_eq!(read(dir.path(), "out.js"), "MIN");
    assert_eq!(report.compiled(), 1);
    assert_eq!(report.failed(), 0);
    assert!(report.written);
}

#[tokio::test]
async fn test_failing_compiler_preserves_block() {
    let dir = TempDir::new().unwrap();
    let original = "A<!-- build:js out.js -->x<!-- endbuild -->B";
    write(dir.path(), "index.html", original);

    let report = pipeline(&dir, Arc::new(FailingCompiler))
        .run(dir.path().join("index.html"))
        .await
        .unwrap();

    assert_eq!(read(dir.path(), "index.html"), original);
    assert!(!dir.path().join("out.js").exists());
    assert_eq!(report.failed(), 1);
    let (_, err) = report.failures().next().unwrap();
    assert!(matches!(err, BlockError::Compile { .. }));
}

#[tokio::test]
async fn test_two_adjacent_blocks_of_different_types() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "css/a.css", "a{}");
    write(dir.path(), "js/a.js", "a();");
    write(
        dir.path(),
        "index.html",
        r#"<head>
<!-- build:css css/all.css --><link rel="stylesheet" href="css/a.css"><!-- endbuild -->
  <!-- sep -->
<!-- build:js js/all.js --><script src="js/a.js"></script><!-- endbuild -->
</head>"#,
    );

    pipeline(&dir, Arc::new(SelectiveCompiler))
        .run(dir.path().join("index.html"))
        .await
        .unwrap();

    assert_eq!(
        read(dir.path(), "index.html"),
        "<head>\nCSSREF(css/all.css)\n  <!-- sep -->\nREF(js/all.js)\n</head>"
    );
    assert_eq!(read(dir.path(), "css/all.css"), "A{}");
    assert_eq!(read(dir.path(), "js/all.js"), "A();");
}

#[tokio::test]
async fn test_assets_concatenated_in_document_order() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "js/one.js", "1;");
    write(dir.path(), "js/two.js", "2;");
    write(dir.path(), "js/three.js", "3;");
    write(
        dir.path(),
        "index.html",
        r#"<!-- build:js app.js -->
<script src="js/two.js"></script>
<script src="/js/three.js"></script>
<script src="js/one.js"></script>
<!-- endbuild -->"#,
    );

    let report = Pipeline::new(
        Settings::new(dir.path()),
        ProcessorRegistry::builtin(Arc::new(minblock_core::compiler::PassthroughCompiler))
            .unwrap(),
    )
    .run(dir.path().join("index.html"))
    .await
    .unwrap();

    assert_eq!(read(dir.path(), "app.js"), "2;3;1;");
    assert_eq!(
        report.blocks[0].asset_files,
        vec!["js/two.js", "/js/three.js", "js/one.js"]
    );
    assert_eq!(
        read(dir.path(), "index.html"),
        r#"<script src="app.js" type="text/javascript"></script>"#
    );
}

// =============================================================================
// Failure isolation
// =============================================================================

#[tokio::test]
async fn test_one_failing_block_does_not_affect_others() {
    let dir = TempDir::new().unwrap();
    let mut html = String::from("<body>\n");
    for i in 0..6 {
        let body = if i == 3 { "FAIL" } else { "ok" };
        write(dir.path(), &format!("src/{i}.js"), &format!("{body}{i};"));
        html.push_str(&format!(
            "<p>{i}</p><!-- build:js out/{i}.js --><script src=\"src/{i}.js\"></script><!-- endbuild -->\n"
        ));
    }
    html.push_str("</body>");
    write(dir.path(), "index.html", &html);

    let report = pipeline(&dir, Arc::new(SelectiveCompiler))
        .run(dir.path().join("index.html"))
        .await
        .unwrap();

    assert_eq!(report.compiled(), 5);
    assert_eq!(report.failed(), 1);

    let mut expected = String::from("<body>\n");
    for i in 0..6 {
        if i == 3 {
            expected.push_str(&format!(
                "<p>{i}</p><!-- build:js out/{i}.js --><script src=\"src/{i}.js\"></script><!-- endbuild -->\n"
            ));
        } else {
            expected.push_str(&format!("<p>{i}</p>REF(out/{i}.js)\n"));
            assert_eq!(read(dir.path(), &format!("out/{i}.js")), format!("OK{i};"));
        }
    }
    expected.push_str("</body>");
    assert_eq!(read(dir.path(), "index.html"), expected);
    assert!(!dir.path().join("out/3.js").exists());
}

#[tokio::test]
async fn test_blocks_are_compiled_concurrently() {
    let dir = TempDir::new().unwrap();
    let n = 4;
    let mut html = String::new();
    for i in 0..n {
        html.push_str(&format!("<!-- build:js b{i}.js -->x<!-- endbuild -->"));
    }
    write(dir.path(), "index.html", &html);

    let compiler = Arc::new(BarrierCompiler(Barrier::new(n)));
    let pipeline = pipeline(&dir, compiler);
    let run = pipeline.run(dir.path().join("index.html"));

    let report = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .expect("blocks were not processed concurrently")
        .unwrap();
    assert_eq!(report.compiled(), n);
}

#[tokio::test]
async fn test_panicking_task_is_isolated() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.js", "PANIC");
    write(dir.path(), "b.js", "fine");
    let original_first = r#"<!-- build:js a.min.js --><script src="a.js"></script><!-- endbuild -->"#;
    write(
        dir.path(),
        "index.html",
        &format!(
            "{original_first}|<!-- build:js b.min.js --><script src=\"b.js\"></script><!-- endbuild -->"
        ),
    );

    let report = pipeline(&dir, Arc::new(PanickingCompiler))
        .run(dir.path().join("index.html"))
        .await
        .unwrap();

    assert!(matches!(
        report.blocks[0].state,
        BlockState::Failed(BlockError::TaskPanicked { .. })
    ));
    assert_eq!(
        read(dir.path(), "index.html"),
        format!("{original_first}|REF(b.min.js)")
    );
    assert_eq!(read(dir.path(), "b.min.js"), "fine");
}

#[tokio::test]
async fn test_unregistered_type_preserved() {
    let dir = TempDir::new().unwrap();
    let html = "<!-- build:svg icons.svg --><img src=\"a.svg\"><!-- endbuild -->|<!-- build:js out.js -->x<!-- endbuild -->";
    write(dir.path(), "index.html", html);

    let report = pipeline(&dir, Arc::new(LiteralCompiler("MIN")))
        .run(dir.path().join("index.html"))
        .await
        .unwrap();

    assert_eq!(
        read(dir.path(), "index.html"),
        "<!-- build:svg icons.svg --><img src=\"a.svg\"><!-- endbuild -->|REF(out.js)"
    );
    assert_eq!(
        report.blocks[0].error(),
        Some(&BlockError::NoProcessor {
            block_type: "svg".to_string()
        })
    );
}

#[tokio::test]
async fn test_missing_asset_fails_only_its_block() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "present.js", "p");
    let broken = r#"<!-- build:js a.js --><script src="missing.js"></script><!-- endbuild -->"#;
    write(
        dir.path(),
        "index.html",
        &format!("{broken}<!-- build:js b.js --><script src=\"present.js\"></script><!-- endbuild -->"),
    );

    let report = pipeline(&dir, Arc::new(SelectiveCompiler))
        .run(dir.path().join("index.html"))
        .await
        .unwrap();

    assert!(matches!(
        report.blocks[0].error(),
        Some(BlockError::AssetRead { .. })
    ));
    assert_eq!(read(dir.path(), "index.html"), format!("{broken}REF(b.js)"));
}

#[tokio::test]
async fn test_artifact_write_failure_keeps_original_markup() {
    let dir = TempDir::new().unwrap();
    // A file where the artifact's parent directory should be
    write(dir.path(), "dist", "not a directory");
    let original = "<!-- build:js dist/app.js -->x<!-- endbuild -->";
    write(dir.path(), "index.html", original);

    let report = pipeline(&dir, Arc::new(LiteralCompiler("MIN")))
        .run(dir.path().join("index.html"))
        .await
        .unwrap();

    assert!(matches!(
        report.blocks[0].error(),
        Some(BlockError::ArtifactWrite { .. })
    ));
    assert_eq!(read(dir.path(), "index.html"), original);
}

// =============================================================================
// Structural errors and documents without blocks
// =============================================================================

#[tokio::test]
async fn test_structural_error_aborts_before_processing() {
    let dir = TempDir::new().unwrap();
    let original = "<!-- build:js a.js -->x<!-- endbuild --><!-- build:js b.js -->y";
    write(dir.path(), "index.html", original);

    let err = pipeline(&dir, Arc::new(LiteralCompiler("MIN")))
        .run(dir.path().join("index.html"))
        .await
        .unwrap_err();

    assert!(is_structural(&err));
    let root = core_error(&err).expect("core error");
    assert!(matches!(root, Error::UnterminatedBlock { .. }));
    assert_eq!(read(dir.path(), "index.html"), original);
    assert!(!dir.path().join("a.js").exists());
}

#[tokio::test]
async fn test_document_without_blocks_is_untouched() {
    let dir = TempDir::new().unwrap();
    let original = "<html><!-- a comment --><body>plain</body></html>\n";
    write(dir.path(), "index.html", original);

    let report = pipeline(&dir, Arc::new(FailingCompiler))
        .run(dir.path().join("index.html"))
        .await
        .unwrap();

    assert!(report.blocks.is_empty());
    assert!(!report.written);
    assert_eq!(read(dir.path(), "index.html"), original);
}

#[tokio::test]
async fn test_missing_document_is_an_error() {
    let dir = TempDir::new().unwrap();
    let result = pipeline(&dir, Arc::new(FailingCompiler))
        .run(dir.path().join("nope.html"))
        .await;
    assert!(result.is_err());
}

// =============================================================================
// Modes and settings
// =============================================================================

#[rstest]
#[case("<!-- build:css @inline -->")]
#[case("<!-- build:css -->")]
#[case("<!--build:css   @inline-->")]
#[tokio::test]
async fn test_inline_block_embeds_output(#[case] start_marker: &str) {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.css", "p{}");
    write(
        dir.path(),
        "index.html",
        &format!("<head>{start_marker}<link href=\"a.css\"><!-- endbuild --></head>"),
    );

    pipeline(&dir, Arc::new(SelectiveCompiler))
        .run(dir.path().join("index.html"))
        .await
        .unwrap();

    assert_eq!(read(dir.path(), "index.html"), "<head>STYLE(P{})</head>");
    let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(entries.len(), 2, "inline mode must not write an artifact");
}

#[tokio::test]
async fn test_inline_non_utf8_output_fails_block() {
    let dir = TempDir::new().unwrap();
    let original = "<!-- build:js -->x<!-- endbuild -->";
    write(dir.path(), "index.html", original);

    struct BinaryCompiler;

    #[async_trait]
    impl Compiler for BinaryCompiler {
        fn name(&self) -> &str {
            "binary"
        }

        async fn compile(&self, _source: Vec<u8>) -> minblock_core::Result<Vec<u8>> {
            Ok(vec![0xff, 0xfe])
        }
    }

    let report = pipeline(&dir, Arc::new(BinaryCompiler))
        .run(dir.path().join("index.html"))
        .await
        .unwrap();

    assert_eq!(report.blocks[0].error(), Some(&BlockError::NonUtf8Inline));
    assert_eq!(read(dir.path(), "index.html"), original);
}

#[tokio::test]
async fn test_explicit_output_path() {
    let dir = TempDir::new().unwrap();
    let original = "A<!-- build:js out.js -->x<!-- endbuild -->B";
    write(dir.path(), "index.html", original);

    let settings = Settings::new(dir.path()).with_output(dir.path().join("dist/index.html"));
    Pipeline::new(settings, ref_registry(Arc::new(LiteralCompiler("MIN"))))
        .run(dir.path().join("index.html"))
        .await
        .unwrap();

    assert_eq!(read(dir.path(), "index.html"), original);
    assert_eq!(read(dir.path(), "dist/index.html"), "AREF(out.js)B");
}

#[tokio::test]
async fn test_document_write_failure_is_fatal() {
    let dir = TempDir::new().unwrap();
    let original = "A<!-- build:js out.js --><script src=\"a.js\"></script><!-- endbuild -->B";
    write(dir.path(), "a.js", "a");
    write(dir.path(), "index.html", original);
    write(dir.path(), "blocker", "not a directory");

    let settings = Settings::new(dir.path())
        .with_output(dir.path().join("blocker").join("out.html"))
        .with_remove_sources(true);
    let err = Pipeline::new(settings, ref_registry(Arc::new(SelectiveCompiler)))
        .run(dir.path().join("index.html"))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Failed to write"));
    assert!(!is_structural(&err));
    assert_eq!(read(dir.path(), "index.html"), original);
    // sources are only removed once the document is written
    assert_eq!(read(dir.path(), "a.js"), "a");
}

#[tokio::test]
async fn test_remove_sources_only_for_compiled_blocks() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "ok.js", "ok");
    write(dir.path(), "bad.js", "FAIL");
    write(
        dir.path(),
        "index.html",
        "<!-- build:js a.js --><script src=\"ok.js\"></script><!-- endbuild -->\
         <!-- build:js b.js --><script src=\"bad.js\"></script><!-- endbuild -->",
    );

    let settings = Settings::new(dir.path()).with_remove_sources(true);
    Pipeline::new(settings, ref_registry(Arc::new(SelectiveCompiler)))
        .run(dir.path().join("index.html"))
        .await
        .unwrap();

    assert!(!dir.path().join("ok.js").exists());
    assert!(dir.path().join("bad.js").exists());
    assert_eq!(read(dir.path(), "a.js"), "OK");
}

#[tokio::test]
async fn test_remove_sources_keeps_assets_shared_with_failed_block() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "common.js", "common");
    write(dir.path(), "bad.js", "FAIL");
    let failing_block = "<!-- build:js b.min.js --><script src=\"common.js\"></script>\
                         <script src=\"bad.js\"></script><!-- endbuild -->";
    write(
        dir.path(),
        "index.html",
        &format!(
            "<!-- build:js a.min.js --><script src=\"common.js\"></script><!-- endbuild -->{failing_block}"
        ),
    );

    let settings = Settings::new(dir.path()).with_remove_sources(true);
    let report = Pipeline::new(settings, ref_registry(Arc::new(SelectiveCompiler)))
        .run(dir.path().join("index.html"))
        .await
        .unwrap();

    assert_eq!(report.compiled(), 1);
    assert_eq!(report.failed(), 1);
    assert_eq!(
        read(dir.path(), "index.html"),
        format!("REF(a.min.js){failing_block}")
    );
    assert_eq!(read(dir.path(), "common.js"), "common");
    assert!(dir.path().join("bad.js").exists());
}

#[tokio::test]
async fn test_remove_sources_keeps_artifact_with_source_name() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "app.js", "app");
    write(
        dir.path(),
        "index.html",
        "<!-- build:js app.js --><script src=\"app.js\"></script><!-- endbuild -->",
    );

    let settings = Settings::new(dir.path()).with_remove_sources(true);
    Pipeline::new(settings, ref_registry(Arc::new(SelectiveCompiler)))
        .run(dir.path().join("index.html"))
        .await
        .unwrap();

    assert_eq!(read(dir.path(), "app.js"), "APP");
}

#[tokio::test]
async fn test_scan_fills_asset_references() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "index.html",
        "<!-- build:js a.js --><script src=\"x.js\"></script><!-- endbuild --><!-- build:svg s.svg --><!-- endbuild -->",
    );

    let blocks = pipeline(&dir, Arc::new(FailingCompiler))
        .scan(dir.path().join("index.html"))
        .await
        .unwrap();

    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].asset_files, vec!["x.js"]);
    assert!(blocks[1].asset_files.is_empty());
    assert!(blocks.iter().all(|b| b.state == BlockState::Pending));
}
