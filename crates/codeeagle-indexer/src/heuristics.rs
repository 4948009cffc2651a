//! Test detection heuristics, per language
//!
//! These tables drive both parser-side classification (`TestFile`,
//! `TestFunction`) and the linker's coverage phase.

use std::path::Path;

fn basename(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path)
}

fn stem(path: &str) -> &str {
    Path::new(path)
        .file_stem()
        .and_then(|name| name.to_str())
        .unwrap_or(path)
}

const JS_EXTS: [&str; 4] = ["ts", "tsx", "js", "jsx"];

pub fn is_test_file(language: &str, path: &str) -> bool {
    let base = basename(path);
    match language {
        "go" => base.ends_with("_test.go"),
        "python" => base.starts_with("test_") || base.ends_with("_test.py"),
        "typescript" | "javascript" => JS_EXTS.iter().any(|ext| {
            base.ends_with(&format!(".test.{ext}")) || base.ends_with(&format!(".spec.{ext}"))
        }),
        "java" => {
            let stem = stem(path);
            stem.starts_with("Test")
                || stem.ends_with("Test")
                || stem.ends_with("Tests")
                || stem.ends_with("IT")
        }
        _ => false,
    }
}

pub fn is_test_function(language: &str, in_test_file: bool, name: &str) -> bool {
    match language {
        "go" => {
            in_test_file
                && ["Test", "Benchmark", "Example", "Fuzz"]
                    .iter()
                    .any(|prefix| name.starts_with(prefix))
        }
        "python" => in_test_file && name.starts_with("test_"),
        // Any function in a test file is a test function
        "typescript" | "javascript" => in_test_file,
        "java" => in_test_file && name.starts_with("test"),
        _ => false,
    }
}

/// Candidate non-test filenames a test file covers, by the filename
/// heuristic. Paths are relative to the same directory as the test file.
pub fn covered_file_candidates(language: &str, test_path: &str) -> Vec<String> {
    let dir = Path::new(test_path)
        .parent()
        .and_then(|p| p.to_str())
        .unwrap_or("");
    let base = basename(test_path);
    let join = |name: String| {
        if dir.is_empty() {
            name
        } else {
            format!("{dir}/{name}")
        }
    };

    let mut candidates = Vec::new();
    match language {
        "go" => {
            if let Some(prefix) = base.strip_suffix("_test.go") {
                candidates.push(join(format!("{prefix}.go")));
            }
        }
        "python" => {
            if let Some(rest) = base.strip_prefix("test_") {
                candidates.push(join(rest.to_string()));
            }
            if let Some(prefix) = base.strip_suffix("_test.py") {
                candidates.push(join(format!("{prefix}.py")));
            }
        }
        "typescript" | "javascript" => {
            for ext in JS_EXTS {
                for marker in [".test.", ".spec."] {
                    if let Some(prefix) = base.strip_suffix(&format!("{marker}{ext}")) {
                        candidates.push(join(format!("{prefix}.{ext}")));
                    }
                }
            }
        }
        "java" => {
            let stem = stem(test_path);
            for covered in [
                stem.strip_prefix("Test"),
                stem.strip_suffix("Tests"),
                stem.strip_suffix("Test"),
                stem.strip_suffix("IT"),
            ]
            .into_iter()
            .flatten()
            {
                if !covered.is_empty() {
                    candidates.push(join(format!("{covered}.java")));
                }
            }
        }
        _ => {}
    }
    candidates.dedup();
    candidates
}

/// The function a test function exercises, stripped of its test prefix.
/// `TestFoo` → `Foo`, `test_foo` → `foo`. `None` when stripping leaves
/// nothing.
pub fn covered_function_name(language: &str, test_name: &str) -> Option<String> {
    let stripped = match language {
        "go" => ["Test", "Benchmark", "Example", "Fuzz"]
            .iter()
            .find_map(|prefix| test_name.strip_prefix(prefix)),
        "python" => test_name.strip_prefix("test_"),
        "java" => test_name.strip_prefix("test"),
        _ => None,
    }?;
    let trimmed = stripped.trim_start_matches('_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_go_heuristics() {
        assert!(is_test_file("go", "pkg/handler_test.go"));
        assert!(!is_test_file("go", "pkg/handler.go"));
        assert!(is_test_function("go", true, "TestHandler"));
        assert!(is_test_function("go", true, "FuzzParse"));
        assert!(!is_test_function("go", false, "TestHandler"));
        assert!(!is_test_function("go", true, "helper"));
        assert_eq!(
            covered_file_candidates("go", "pkg/handler_test.go"),
            vec!["pkg/handler.go".to_string()]
        );
        assert_eq!(
            covered_function_name("go", "TestHandler"),
            Some("Handler".to_string())
        );
    }

    #[test]
    fn test_python_heuristics() {
        assert!(is_test_file("python", "tests/test_views.py"));
        assert!(is_test_file("python", "views_test.py"));
        assert!(!is_test_file("python", "views.py"));
        assert!(is_test_function("python", true, "test_get"));
        assert!(!is_test_function("python", false, "test_get"));
        assert!(covered_file_candidates("python", "tests/test_views.py")
            .contains(&"tests/views.py".to_string()));
    }

    #[test]
    fn test_js_heuristics() {
        assert!(is_test_file("typescript", "src/app.test.ts"));
        assert!(is_test_file("javascript", "src/app.spec.jsx"));
        assert!(!is_test_file("typescript", "src/app.ts"));
        assert!(is_test_function("typescript", true, "anything"));
        assert_eq!(
            covered_file_candidates("typescript", "src/app.test.ts"),
            vec!["src/app.ts".to_string()]
        );
    }

    #[test]
    fn test_java_heuristics() {
        assert!(is_test_file("java", "src/UserServiceTest.java"));
        assert!(is_test_file("java", "src/TestUserService.java"));
        assert!(is_test_file("java", "src/UserServiceIT.java"));
        assert!(!is_test_file("java", "src/UserService.java"));
        assert!(is_test_function("java", true, "testLoad"));
        assert!(covered_file_candidates("java", "src/UserServiceTest.java")
            .contains(&"src/UserService.java".to_string()));
    }
}
