//! Tree pipeline: filtering, grouping into folders, sorting, and flattening
//!
//! The pipeline is a pure function of the flat item list plus options. It
//! never keeps parent/child state between runs.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use super::types::{Item, Node, Row, SortMode};
use crate::keys;

/// Turns a flat list into folder nodes carrying their direct descendants
pub trait Grouper: Send + Sync {
    fn group(&self, items: Vec<Item>, root: &str) -> Vec<Node>;
}

/// Reorders siblings at every level of a grouped tree
pub trait Sorter: Send + Sync {
    fn sort(&self, nodes: Vec<Node>) -> Vec<Node>;
}

/// Groups items by their key prefixes.
///
/// Folders that only exist implicitly (a file `a/b.txt` without an `a/`
/// item, typically because a name filter dropped it) are synthesised so the
/// file stays reachable.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupByFolder;

enum Slot {
    File(Item),
    Folder {
        key: String,
        item: Option<Item>,
        descendants: Vec<Item>,
    },
}

impl Grouper for GroupByFolder {
    fn group(&self, items: Vec<Item>, root: &str) -> Vec<Node> {
        let mut slots: Vec<Slot> = Vec::new();
        let mut folder_slots: HashMap<String, usize> = HashMap::new();

        for item in items {
            let Some(rest) = item.key.strip_prefix(root) else {
                continue;
            };
            if rest.is_empty() {
                continue;
            }

            match rest.find(keys::SEPARATOR) {
                None => slots.push(Slot::File(item)),
                Some(idx) => {
                    let folder_key = format!("{}{}", root, &rest[..=idx]);
                    let is_folder_itself = idx + 1 == rest.len();
                    let slot_idx = *folder_slots
                        .entry(folder_key.clone())
                        .or_insert_with(|| {
                            slots.push(Slot::Folder {
                                key: folder_key,
                                item: None,
                                descendants: Vec::new(),
                            });
                            slots.len() - 1
                        });

                    if let Slot::Folder {
                        item: explicit,
                        descendants,
                        ..
                    } = &mut slots[slot_idx]
                    {
                        if is_folder_itself {
                            *explicit = Some(item);
                        } else {
                            descendants.push(item);
                        }
                    }
                }
            }
        }

        slots
            .into_iter()
            .map(|slot| match slot {
                Slot::File(item) => Node::File(item),
                Slot::Folder {
                    key,
                    item,
                    descendants,
                } => {
                    let children = self.group(descendants, &key);
                    Node::Folder {
                        item: item.unwrap_or_else(|| Item::folder(key)),
                        children,
                    }
                }
            })
            .collect()
    }
}

/// Folders first, then files, each case-insensitively by name
#[derive(Debug, Clone, Copy, Default)]
pub struct SortByName;

impl Sorter for SortByName {
    fn sort(&self, nodes: Vec<Node>) -> Vec<Node> {
        let (mut folders, mut files) = split_sorted_children(nodes, self);
        folders.sort_by_cached_key(|n| n.item().name().to_lowercase());
        files.sort_by_cached_key(|n| n.item().name().to_lowercase());
        folders.extend(files);
        folders
    }
}

/// Folders by name, then files with the most recently modified first.
/// Files without a timestamp go last.
#[derive(Debug, Clone, Copy, Default)]
pub struct SortByModified;

impl Sorter for SortByModified {
    fn sort(&self, nodes: Vec<Node>) -> Vec<Node> {
        let (mut folders, mut files) = split_sorted_children(nodes, self);
        folders.sort_by_cached_key(|n| n.item().name().to_lowercase());
        files.sort_by(|a, b| {
            let (a, b) = (a.item(), b.item());
            b.modified
                .cmp(&a.modified)
                .then_with(|| a.name().to_lowercase().cmp(&b.name().to_lowercase()))
        });
        folders.extend(files);
        folders
    }
}

/// Sort every folder's children, then split the level into (folders, files)
fn split_sorted_children(nodes: Vec<Node>, sorter: &dyn Sorter) -> (Vec<Node>, Vec<Node>) {
    nodes
        .into_iter()
        .map(|node| match node {
            Node::Folder { item, children } => Node::Folder {
                item,
                children: sorter.sort(children),
            },
            file => file,
        })
        .partition(Node::is_folder)
}

pub fn sorter_for(mode: SortMode) -> Arc<dyn Sorter> {
    match mode {
        SortMode::ByName => Arc::new(SortByName),
        SortMode::ByModified => Arc::new(SortByModified),
    }
}

pub struct PipelineOptions<'a> {
    pub name_filter: &'a str,
    pub show_folders_on_filter: bool,
    /// Children are rendered inside their folder by the presentation layer
    pub nest_children: bool,
    /// `None` drops folders and renders files only
    pub group: Option<&'a dyn Grouper>,
    pub sort: Option<&'a dyn Sorter>,
    pub open_folders: &'a BTreeSet<String>,
}

impl<'a> PipelineOptions<'a> {
    /// Default grouping and sorting, no filter
    pub fn new(open_folders: &'a BTreeSet<String>) -> Self {
        Self {
            name_filter: "",
            show_folders_on_filter: false,
            nest_children: false,
            group: Some(&GroupByFolder),
            sort: Some(&SortByName),
            open_folders,
        }
    }

    pub fn filtering(&self) -> bool {
        !self.name_filter.is_empty()
    }
}

/// Output of one pipeline run
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    pub tree: Vec<Node>,
    /// Depth-first, visibility-aware sequence used for range selection and paging
    pub rows: Vec<Row>,
}

impl Pipeline {
    pub fn keys(&self) -> Vec<String> {
        self.rows.iter().map(|r| r.item.key.clone()).collect()
    }

    /// Find a node anywhere in the tree
    pub fn find(&self, key: &str) -> Option<&Node> {
        fn walk<'n>(nodes: &'n [Node], key: &str) -> Option<&'n Node> {
            nodes.iter().find_map(|node| {
                if node.key() == key {
                    Some(node)
                } else {
                    walk(node.children(), key)
                }
            })
        }
        walk(&self.tree, key)
    }
}

/// Run filter → group → sort → flatten
pub fn build(items: &[Item], options: &PipelineOptions) -> Pipeline {
    let filtered = filter_items(items.to_vec(), options.name_filter);
    let tree = group_and_sort(filtered, options);
    let rows = flatten(&tree, options);
    Pipeline { tree, rows }
}

/// Keep the items whose lowercased key contains every whitespace-separated term
pub fn filter_items(items: Vec<Item>, name_filter: &str) -> Vec<Item> {
    if name_filter.is_empty() {
        return items;
    }

    let filter_lower = name_filter.to_lowercase();
    let terms: Vec<&str> = filter_lower.split_whitespace().collect();

    items
        .into_iter()
        .filter(|item| {
            let key_lower = item.key.to_lowercase();
            terms.iter().all(|term| key_lower.contains(term))
        })
        .collect()
}

fn group_and_sort(items: Vec<Item>, options: &PipelineOptions) -> Vec<Node> {
    let nodes = match options.group {
        Some(grouper) => grouper.group(items, ""),
        None => items
            .into_iter()
            .filter(|item| !item.is_folder())
            .map(Node::File)
            .collect(),
    };

    match options.sort {
        Some(sorter) => sorter.sort(nodes),
        None => nodes,
    }
}

/// Depth-first walk producing the visible rows
pub fn flatten(tree: &[Node], options: &PipelineOptions) -> Vec<Row> {
    let mut rows = Vec::new();
    flatten_into(tree, options, 0, &mut rows);
    rows
}

fn flatten_into(nodes: &[Node], options: &PipelineOptions, depth: usize, rows: &mut Vec<Row>) {
    let filtering = options.filtering();
    let row_depth = if filtering { 0 } else { depth };

    for node in nodes {
        match node {
            Node::File(item) => rows.push(Row {
                item: item.clone(),
                depth: row_depth,
            }),
            Node::Folder { item, children } => {
                if options.show_folders_on_filter || !filtering {
                    rows.push(Row {
                        item: item.clone(),
                        depth: row_depth,
                    });
                }
                let descend = filtering
                    || (options.open_folders.contains(&item.key) && !options.nest_children);
                if descend {
                    flatten_into(children, options, depth + 1, rows);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn items(keys: &[&str]) -> Vec<Item> {
        keys.iter().map(|k| Item::new(*k, 10, None)).collect()
    }

    /// A small project layout with nested folders and loose files
    fn create_test_fixture() -> Vec<Item> {
        items(&[
            "src/",
            "src/main.rs",
            "src/lib.rs",
            "src/utils/",
            "src/utils/helper.rs",
            "docs/",
            "docs/README.md",
            "Cargo.toml",
            "LICENSE",
        ])
    }

    fn row_keys(rows: &[Row]) -> Vec<&str> {
        rows.iter().map(|r| r.key()).collect()
    }

    #[test]
    fn test_filter_scenario_hides_folders() {
        let open = BTreeSet::new();
        let options = PipelineOptions {
            name_filter: "b",
            ..PipelineOptions::new(&open)
        };
        let pipeline = build(&items(&["a/", "a/b.txt", "c.txt"]), &options);
        assert_eq!(pipeline.keys(), vec!["a/b.txt"]);
        assert_eq!(pipeline.rows[0].depth, 0);
    }

    #[test]
    fn test_filter_shows_folders_when_configured() {
        let open = BTreeSet::new();
        let options = PipelineOptions {
            name_filter: "a",
            show_folders_on_filter: true,
            ..PipelineOptions::new(&open)
        };
        let pipeline = build(&items(&["a/", "a/b.txt", "c.txt"]), &options);
        assert_eq!(pipeline.keys(), vec!["a/", "a/b.txt"]);
        assert!(pipeline.rows.iter().all(|r| r.depth == 0));
    }

    #[test]
    fn test_filter_terms_are_anded_substrings() {
        let all = create_test_fixture();
        let filtered = filter_items(all, "SRC rs");
        let keys: Vec<&str> = filtered.iter().map(|i| i.key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["src/main.rs", "src/lib.rs", "src/utils/helper.rs"]
        );
    }

    #[test]
    fn test_filter_is_idempotent() {
        let once = filter_items(create_test_fixture(), "src u");
        let twice = filter_items(once.clone(), "src u");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_closed_tree_yields_top_level_only() {
        let open = BTreeSet::new();
        let pipeline = build(&create_test_fixture(), &PipelineOptions::new(&open));
        assert_eq!(
            row_keys(&pipeline.rows),
            vec!["docs/", "src/", "Cargo.toml", "LICENSE"]
        );
        assert!(pipeline.rows.iter().all(|r| r.depth == 0));
    }

    #[test]
    fn test_open_folder_descends_with_depth() {
        let open: BTreeSet<String> = ["src/".to_string(), "src/utils/".to_string()].into();
        let pipeline = build(&create_test_fixture(), &PipelineOptions::new(&open));
        assert_eq!(
            row_keys(&pipeline.rows),
            vec![
                "docs/",
                "src/",
                "src/utils/",
                "src/utils/helper.rs",
                "src/lib.rs",
                "src/main.rs",
                "Cargo.toml",
                "LICENSE",
            ]
        );
        let depths: Vec<usize> = pipeline.rows.iter().map(|r| r.depth).collect();
        assert_eq!(depths, vec![0, 0, 1, 2, 1, 1, 0, 0]);
    }

    #[test]
    fn test_open_child_of_closed_folder_stays_hidden() {
        let open: BTreeSet<String> = ["src/utils/".to_string()].into();
        let pipeline = build(&create_test_fixture(), &PipelineOptions::new(&open));
        assert!(!pipeline.keys().contains(&"src/utils/helper.rs".to_string()));
    }

    #[test]
    fn test_nested_children_are_left_to_presentation() {
        let open: BTreeSet<String> = ["src/".to_string()].into();
        let options = PipelineOptions {
            nest_children: true,
            ..PipelineOptions::new(&open)
        };
        let pipeline = build(&create_test_fixture(), &options);
        assert_eq!(pipeline.rows.len(), 4);
        let src = pipeline.find("src/").unwrap();
        assert_eq!(src.children().len(), 3);
    }

    #[test]
    fn test_grouping_synthesises_missing_folders() {
        let open = BTreeSet::new();
        let pipeline = build(&items(&["x/y/z.txt"]), &PipelineOptions::new(&open));
        let x = pipeline.find("x/").unwrap();
        assert!(x.is_folder());
        assert_eq!(x.item().size, 0);
        assert_eq!(x.children()[0].key(), "x/y/");
        assert_eq!(x.children()[0].children()[0].key(), "x/y/z.txt");
    }

    #[test]
    fn test_no_grouper_renders_files_only() {
        let open = BTreeSet::new();
        let options = PipelineOptions {
            group: None,
            ..PipelineOptions::new(&open)
        };
        let pipeline = build(&create_test_fixture(), &options);
        assert!(pipeline.rows.iter().all(|r| !r.item.is_folder()));
        assert_eq!(pipeline.rows.len(), 6);
    }

    #[test]
    fn test_sort_by_modified_puts_newest_files_first() {
        let old = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let new = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let list = vec![
            Item::new("a.txt", 1, Some(old)),
            Item::new("b.txt", 1, Some(new)),
            Item::new("c.txt", 1, None),
            Item::folder("z/"),
        ];
        let open = BTreeSet::new();
        let options = PipelineOptions {
            sort: Some(&SortByModified),
            ..PipelineOptions::new(&open)
        };
        let pipeline = build(&list, &options);
        assert_eq!(pipeline.keys(), vec!["z/", "b.txt", "a.txt", "c.txt"]);
    }

    #[test]
    fn test_empty_input() {
        let open = BTreeSet::new();
        let pipeline = build(&[], &PipelineOptions::new(&open));
        assert!(pipeline.tree.is_empty());
        assert!(pipeline.rows.is_empty());
    }
}
