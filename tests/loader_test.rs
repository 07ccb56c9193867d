use assert_fs::prelude::*;
use mini_langchain::loader::{loader_for, DirectoryLoader, Loader, MarkdownLoader, TextLoader};

#[tokio::test]
async fn test_text_loader_reads_whole_file() {
    let temp = assert_fs::TempDir::new().unwrap();
    let file = temp.child("notes.txt");
    file.write_str("line one\nline two\n").unwrap();

    let docs = TextLoader::new(file.path()).load().await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].page_content, "line one\nline two\n");
    assert_eq!(docs[0].source(), Some(file.path().to_str().unwrap()));
}

#[tokio::test]
async fn test_text_loader_missing_file() {
    let temp = assert_fs::TempDir::new().unwrap();
    let err = TextLoader::new(temp.path().join("absent.txt"))
        .load()
        .await
        .unwrap_err();
    assert!(err.to_string().contains("absent.txt"));
}

#[tokio::test]
async fn test_markdown_loader_tags_sections() {
    let temp = assert_fs::TempDir::new().unwrap();
    let file = temp.child("guide.md");
    file.write_str("# Install\nRun the installer.\n\n## Verify\nCheck the version.\n")
        .unwrap();

    let docs = MarkdownLoader::new(file.path()).load().await.unwrap();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].metadata["section"], "Install");
    assert_eq!(docs[1].metadata["section"], "Verify");
    assert_eq!(docs[1].metadata["level"], "2");
    assert_eq!(docs[1].page_content, "Verify\n\nCheck the version.");
    assert!(docs.iter().all(|d| d.source().is_some()));
}

#[tokio::test]
async fn test_directory_loader_filters_and_sorts() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("b.txt").write_str("bravo").unwrap();
    temp.child("a.md").write_str("alpha").unwrap();
    temp.child("nested/c.TXT").write_str("charlie").unwrap();
    temp.child("image.png").write_binary(&[0x89, 0x50, 0x4e, 0x47]).unwrap();

    let loader = DirectoryLoader::new(temp.path());
    let files = loader.files().unwrap();
    assert_eq!(files.len(), 3);
    assert!(files.windows(2).all(|w| w[0] < w[1]));

    let docs = loader.load().await.unwrap();
    let contents: Vec<_> = docs.iter().map(|d| d.page_content.as_str()).collect();
    assert_eq!(contents, ["alpha", "bravo", "charlie"]);

    let only_txt = DirectoryLoader::new(temp.path()).with_extensions([".txt"]);
    assert_eq!(only_txt.load().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_directory_loader_rejects_file_root() {
    let temp = assert_fs::TempDir::new().unwrap();
    let file = temp.child("single.txt");
    file.write_str("x").unwrap();
    assert!(DirectoryLoader::new(file.path()).load().await.is_err());
}

#[tokio::test]
async fn test_loader_for_picks_by_path() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("doc.md")
        .write_str("Preamble.\n\n# Heading\nBody.\n")
        .unwrap();
    temp.child("plain.txt").write_str("plain").unwrap();

    let docs = loader_for(temp.child("doc.md").path())
        .unwrap()
        .load()
        .await
        .unwrap();
    assert_eq!(docs.len(), 2);

    let docs = loader_for(temp.path()).unwrap().load().await.unwrap();
    assert_eq!(docs.len(), 3);

    assert!(loader_for(temp.path().join("missing")).is_err());
}

#[tokio::test]
async fn test_uppercase_markdown_extension_is_split() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("README.MD")
        .write_str("# Usage\nRun it.\n\n# License\nMIT.\n")
        .unwrap();

    let docs = DirectoryLoader::new(temp.path())
        .with_markdown_sections(true)
        .load()
        .await
        .unwrap();
    let sections: Vec<_> = docs.iter().map(|d| d.metadata["section"].as_str()).collect();
    assert_eq!(sections, ["Usage", "License"]);

    let docs = loader_for(temp.child("README.MD").path())
        .unwrap()
        .load()
        .await
        .unwrap();
    assert_eq!(docs.len(), 2);
}
