//! Command-line contract tests for `folio`.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

#[cfg(test)]
#[allow(deprecated)]
mod tests {
    use std::{fs, io::Cursor, process::Command};

    use assert_cmd::prelude::*;
    use predicates::prelude::*;
    use tempfile::tempdir;

    fn folio() -> Command {
        Command::cargo_bin("folio").unwrap()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // MODE
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_viewer_is_downgraded_to_viewing() {
        folio()
            .args(["mode", "--role", "viewer", "--request", "editing"])
            .assert()
            .success()
            .stdout("viewing\n");
    }

    #[test]
    fn test_suggester_cannot_edit() {
        folio()
            .args(["mode", "--role", "suggester", "--request", "editing"])
            .assert()
            .success()
            .stdout("suggesting\n");
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        folio()
            .args(["mode", "--role", "owner", "--request", "editing"])
            .assert()
            .failure();
    }

    // ═══════════════════════════════════════════════════════════════════════
    // DOCUMENTS
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_documents_prints_canonical_records() {
        let dir = tempdir().unwrap();
        let config = dir.path().join("session.toml");
        fs::write(
            &config,
            r##"
selector = "#editor"
document = "https://files.example.com/contract.docx"
"##,
        )
        .unwrap();

        let output = folio().arg("documents").arg(&config).output().unwrap();
        assert!(output.status.success());

        let docs: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        let docs = docs.as_array().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["type"], "docx");
        assert_eq!(docs[0]["url"], "https://files.example.com/contract.docx");
        assert_eq!(docs[0]["isNewFile"], true);
    }

    #[test]
    fn test_documents_rejects_unknown_extension() {
        let dir = tempdir().unwrap();
        let config = dir.path().join("session.yaml");
        fs::write(&config, "selector: x").unwrap();

        folio()
            .arg("documents")
            .arg(&config)
            .assert()
            .code(1)
            .stderr(predicate::str::contains("Unsupported config extension"));
    }

    #[test]
    fn test_documents_missing_file_is_io_failure() {
        folio()
            .args(["documents", "/nonexistent/session.toml"])
            .assert()
            .code(2);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // BUNDLE
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_single_docx_is_written_as_is() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("contract.docx");
        fs::write(&input, b"PK-contract").unwrap();
        let out = dir.path().join("dist");

        folio()
            .args(["bundle", "--name", "Contract v2", "--out"])
            .arg(&out)
            .arg(&input)
            .assert()
            .success()
            .stdout(predicate::str::contains("Contract v2.docx"));

        assert_eq!(fs::read(out.join("Contract v2.docx")).unwrap(), b"PK-contract");
    }

    #[test]
    fn test_lone_pdf_keeps_its_extension() {
        let dir = tempdir().unwrap();
        let terms = dir.path().join("terms.pdf");
        fs::write(&terms, b"%PDF").unwrap();
        let out = dir.path().join("dist");

        folio()
            .args(["bundle", "--name", "Terms", "--out"])
            .arg(&out)
            .arg(&terms)
            .assert()
            .success()
            .stdout(predicate::str::contains("Terms.pdf"));

        assert_eq!(fs::read(out.join("Terms.pdf")).unwrap(), b"%PDF");
        assert!(!out.join("Terms.docx").exists());
    }

    #[test]
    fn test_several_files_are_zipped() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.docx");
        let b = dir.path().join("b.docx");
        let terms = dir.path().join("terms.pdf");
        fs::write(&a, b"A").unwrap();
        fs::write(&b, b"B").unwrap();
        fs::write(&terms, b"%PDF").unwrap();
        let out = dir.path().join("dist");

        folio()
            .args(["bundle", "--name", "Deal", "--out"])
            .arg(&out)
            .args([&a, &b, &terms])
            .assert()
            .success();

        let data = fs::read(out.join("Deal.zip")).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(data)).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(names, vec!["terms.pdf", "Deal.docx", "Deal (2).docx"]);
    }

    #[test]
    fn test_missing_input_file_fails() {
        let dir = tempdir().unwrap();
        folio()
            .args(["bundle", "--out"])
            .arg(dir.path())
            .arg(dir.path().join("missing.docx"))
            .assert()
            .code(2)
            .stderr(predicate::str::contains("Failed to read"));
    }
}
