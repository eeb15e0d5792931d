use std::path::{Component, Path};

/// Path segments with `.` dropped and `..` folded where possible.
fn segments(path: &Path) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(segment) => out.push(segment.to_string_lossy().into_owned()),
            Component::ParentDir => match out.last() {
                Some(last) if last != ".." => {
                    out.pop();
                }
                _ => out.push("..".into()),
            },
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    out
}

/// URL-encoded link from the directory holding `from_file` to `to_file`.
///
/// Both paths are taken relative to the same root: `public/pages/A` linking
/// to `public/B` yields `../B`.
pub fn relative_link(from_file: &Path, to_file: &Path) -> String {
    let from_dir = segments(from_file.parent().unwrap_or(Path::new("")));
    let to = segments(to_file);

    let common = from_dir
        .iter()
        .zip(&to)
        .take_while(|(a, b)| a == b)
        .count();

    std::iter::repeat_n("..".to_string(), from_dir.len() - common)
        .chain(to[common..].iter().map(|s| urlencoding::encode(s).into_owned()))
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(from: &str, to: &str) -> String {
        relative_link(Path::new(from), Path::new(to))
    }

    #[test]
    fn test_parent_directory() {
        assert_eq!(link("public/pages/A", "public/B"), "../B");
    }

    #[test]
    fn test_top_level_siblings() {
        assert_eq!(link("A", "B"), "B");
        assert_eq!(link("out/A.md", "out/B.md"), "B.md");
    }

    #[test]
    fn test_descend_and_climb() {
        assert_eq!(link("out/a/b/x.md", "out/c/y.md"), "../../c/y.md");
        assert_eq!(link("out/x.md", "out/posts/2021/y.md"), "posts/2021/y.md");
        assert_eq!(link("./out/x.md", "out/y.md"), "y.md");
    }

    #[test]
    fn test_segments_are_encoded() {
        assert_eq!(
            link("out/index.md", "out/my posts/Bob's page.md"),
            "my%20posts/Bob%27s%20page.md"
        );
    }
}
