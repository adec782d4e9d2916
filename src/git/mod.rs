//! Git layer adapter (spec §6, "Git layer — consumed") and virtual
//! projector (spec §4.3).
//!
//! `spec.md` treats the git object reader as an external collaborator with
//! only a handful of operations specified: open a repository, iterate
//! commits, iterate branches/tags, look up a commit, read its text/parents/
//! tree. We get all of that from `git2` (the teacher's own git binding)
//! rather than re-implementing object parsing, per SPEC_FULL.md §4.

pub mod projector;

use std::path::Path;

use anyhow::{Context, Result};
use git2::{Oid, Repository};

use crate::path::RefKind;

/// A git repository layered over an archive's materialized scratch
/// workspace. Opened fresh per operation (spec §3, §5): cheap, and avoids
/// sharing a `git2::Repository` — which is not safely `Sync` — across
/// concurrent requests.
pub struct GitView {
    repo: Repository,
}

impl GitView {
    pub fn open(git_root: &Path) -> Result<Self> {
        let repo = Repository::open_bare(git_root)
            .with_context(|| format!("opening bare repository at {}", git_root.display()))?;
        Ok(Self { repo })
    }

    /// Branch or tag references of the requested kind, as (short name, target
    /// commit) pairs. Annotated tags are peeled to the commit they point at.
    pub fn refs(&self, kind: RefKind) -> Result<Vec<(String, Oid)>> {
        match kind {
            RefKind::Branch => self.branches(),
            RefKind::Tag => self.tags(),
            RefKind::Commit => Ok(Vec::new()),
        }
    }

    fn branches(&self) -> Result<Vec<(String, Oid)>> {
        let mut out = Vec::new();
        for item in self.repo.branches(Some(git2::BranchType::Local))? {
            let (branch, _) = item?;
            let Some(name) = branch.name()? else { continue };
            let Some(target) = branch.get().target() else { continue };
            out.push((name.to_string(), target));
        }
        Ok(out)
    }

    fn tags(&self) -> Result<Vec<(String, Oid)>> {
        let mut out = Vec::new();
        for name in self.repo.tag_names(None)?.iter().flatten() {
            let reference = self.repo.find_reference(&format!("refs/tags/{name}"))?;
            let target = self.peel_to_commit(reference.target())?;
            if let Some(target) = target {
                out.push((name.to_string(), target));
            }
        }
        Ok(out)
    }

    fn peel_to_commit(&self, oid: Option<Oid>) -> Result<Option<Oid>> {
        let Some(oid) = oid else { return Ok(None) };
        let object = self.repo.find_object(oid, None)?;
        Ok(object.peel_to_commit().ok().map(|c| c.id()))
    }

    /// Every commit object in the repository's object database, not merely
    /// the set reachable from a ref (spec §4.3.2: "Listings iterate the
    /// commit-object set of the repository until exhausted").
    pub fn commits(&self) -> Result<Vec<Oid>> {
        let odb = self.repo.odb()?;
        let mut out = Vec::new();
        odb.foreach(|oid| {
            if let Ok((_, kind)) = odb.read_header(*oid) {
                if kind == git2::ObjectType::Commit {
                    out.push(*oid);
                }
            }
            true
        })?;
        Ok(out)
    }

    /// The commit's canonical textual rendering: the raw bytes of the git
    /// commit object itself, exactly as stored (spec §4.3.2).
    pub fn commit_text(&self, oid: Oid) -> Result<Vec<u8>> {
        let object = self.repo.odb()?.read(oid)?;
        Ok(object.data().to_vec())
    }

    pub fn commit_exists(&self, oid: Oid) -> bool {
        self.repo.find_commit(oid).is_ok()
    }

    pub fn commit_parents(&self, oid: Oid) -> Result<Vec<Oid>> {
        let commit = self.repo.find_commit(oid)?;
        Ok(commit.parent_ids().collect())
    }

    /// List the entries of the commit's tree at `path` (empty for the root).
    /// Returns `None` if `path` does not exist in the tree, `Some(Err)`-free
    /// listing otherwise.
    pub fn list_tree(&self, oid: Oid, path: &str) -> Result<Option<Vec<(String, bool, u64)>>> {
        let commit = self.repo.find_commit(oid)?;
        let tree = if path.is_empty() {
            commit.tree()?
        } else {
            let Ok(entry) = commit.tree()?.get_path(Path::new(path)) else { return Ok(None) };
            let Ok(object) = entry.to_object(&self.repo) else { return Ok(None) };
            let Some(tree) = object.as_tree() else { return Ok(None) };
            tree.to_owned()
        };

        let mut out = Vec::new();
        for entry in tree.iter() {
            let name = entry.name().unwrap_or_default().to_string();
            let is_dir = entry.kind() == Some(git2::ObjectType::Tree);
            let size = if is_dir {
                0
            } else {
                entry.to_object(&self.repo).ok().and_then(|o| o.as_blob().map(|b| b.size() as u64)).unwrap_or(0)
            };
            out.push((name, is_dir, size));
        }
        Ok(Some(out))
    }

    /// Stat a single path inside the commit's tree.
    pub fn stat_tree_path(&self, oid: Oid, path: &str) -> Result<Option<(bool, u64)>> {
        let commit = self.repo.find_commit(oid)?;
        if path.is_empty() {
            return Ok(Some((true, 0)));
        }

        let Ok(entry) = commit.tree()?.get_path(Path::new(path)) else { return Ok(None) };
        let is_dir = entry.kind() == Some(git2::ObjectType::Tree);
        let size = if is_dir {
            0
        } else {
            entry.to_object(&self.repo).ok().and_then(|o| o.as_blob().map(|b| b.size() as u64)).unwrap_or(0)
        };
        Ok(Some((is_dir, size)))
    }
}
