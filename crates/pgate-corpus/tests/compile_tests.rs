//! Corpus compiler against a real directory tree

use pgate_corpus::{ChunkConfig, Corpus, CorpusCompiler, CorpusConfig, CorpusManifest, Retriever};
use std::fs;
use std::path::Path;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn governance_repo() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "AGENT_CONTRACT.md", "The agent must cite evidence and stay inside modules.");
    write(root, "POLICY.md", "Network access is forbidden. Tests run in a sandbox.");
    write(root, "policies/enforcer.py", "FORBIDDEN = ['vendor/']");
    write(root, "policies/notes.bin", "binary-ish content that is skipped");
    write(root, "policies/nested/deep.yaml", "rules: []");
    write(root, "modules/foo/foo.py", "def foo(): return 1");
    dir
}

#[test]
fn plan_is_sorted_filtered_and_relative() {
    let repo = governance_repo();
    let compiler = CorpusCompiler::new(repo.path(), CorpusConfig::default());

    let inputs = compiler.plan().unwrap();

    assert_eq!(
        inputs,
        vec![
            "AGENT_CONTRACT.md",
            "POLICY.md",
            "policies/enforcer.py",
            "policies/nested/deep.yaml",
        ]
    );
}

#[test]
fn plan_does_not_write() {
    let repo = governance_repo();
    let compiler = CorpusCompiler::new(repo.path(), CorpusConfig::default());
    compiler.plan().unwrap();
    assert!(!compiler.output_path().exists());
}

#[test]
fn duplicate_roots_are_deduplicated() {
    let repo = governance_repo();
    let config = CorpusConfig::default().with_roots(["POLICY.md", "POLICY.md", "policies"]);
    let inputs = CorpusCompiler::new(repo.path(), config).plan().unwrap();
    assert_eq!(inputs.iter().filter(|p| *p == "POLICY.md").count(), 1);
}

#[test]
fn build_writes_corpus_and_manifest() {
    let repo = governance_repo();
    let compiler = CorpusCompiler::new(repo.path(), CorpusConfig::default());

    let compiled = compiler.build().unwrap();

    let on_disk = Corpus::load(compiler.output_path()).unwrap();
    assert_eq!(on_disk.chunks(), compiled.corpus.chunks());
    assert_eq!(on_disk.digest().unwrap(), compiled.digest);
    assert!(on_disk.contains("POLICY.md::chunk0"));
    assert!(on_disk.contains("AGENT_CONTRACT.md::chunk0"));

    let manifest_path = repo.path().join("standards/compiled/manifest.json");
    let manifest: CorpusManifest =
        serde_json::from_str(&fs::read_to_string(manifest_path).unwrap()).unwrap();
    assert_eq!(manifest.corpus_sha256, compiled.digest);
    assert_eq!(manifest.chunk_count, compiled.corpus.len());
    assert_eq!(manifest.inputs, compiled.inputs);
}

#[test]
fn recompiling_unchanged_inputs_is_idempotent() {
    let repo = governance_repo();
    let compiler = CorpusCompiler::new(repo.path(), CorpusConfig::default());

    let first = compiler.build().unwrap();
    let second = compiler.build().unwrap();

    assert_eq!(first.digest, second.digest);
}

#[test]
fn editing_a_source_changes_its_digest_and_the_corpus_digest() {
    let repo = governance_repo();
    let compiler = CorpusCompiler::new(repo.path(), CorpusConfig::default());
    let before = compiler.compile().unwrap();

    write(repo.path(), "POLICY.md", "Network access is allowed now.");
    let after = compiler.compile().unwrap();

    let sha = |c: &Corpus| c.get("POLICY.md::chunk0").unwrap().source_sha256;
    assert_ne!(sha(&before.corpus), sha(&after.corpus));
    assert_ne!(before.digest, after.digest);
}

#[test]
fn chunking_parameters_change_the_digest() {
    let repo = governance_repo();
    let small = CorpusConfig::default().with_chunking(ChunkConfig::new(16, 4).unwrap());

    let default_digest = CorpusCompiler::new(repo.path(), CorpusConfig::default())
        .compile()
        .unwrap()
        .digest;
    let small_digest = CorpusCompiler::new(repo.path(), small)
        .compile()
        .unwrap()
        .digest;

    assert_ne!(default_digest, small_digest);
}

#[test]
fn invalid_chunking_fails_before_writing() {
    let repo = governance_repo();
    let mut config = CorpusConfig::default();
    config.chunking.overlap = config.chunking.max_chars;
    let compiler = CorpusCompiler::new(repo.path(), config);

    assert!(compiler.build().is_err());
    assert!(!compiler.output_path().exists());
}

#[test]
fn failed_rebuild_keeps_previous_corpus() {
    let repo = governance_repo();
    let compiler = CorpusCompiler::new(repo.path(), CorpusConfig::default());
    let first = compiler.build().unwrap();

    let mut broken = CorpusConfig::default();
    broken.chunking.max_chars = 0;
    assert!(CorpusCompiler::new(repo.path(), broken).build().is_err());

    let on_disk = Corpus::load(compiler.output_path()).unwrap();
    assert_eq!(on_disk.digest().unwrap(), first.digest);
}

#[test]
fn retriever_loads_written_corpus() {
    let repo = governance_repo();
    let compiler = CorpusCompiler::new(repo.path(), CorpusConfig::default());
    compiler.build().unwrap();

    let retriever = Retriever::load(compiler.output_path()).unwrap();
    let hits = retriever.retrieve("network sandbox tests", 8);

    assert!(!hits.is_empty());
    assert_eq!(hits[0].source, "POLICY.md");
}
