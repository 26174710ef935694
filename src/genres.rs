use std::collections::HashSet;

use crate::models::GenreEntry;

/// Merges the movie and TV taxonomies into one display-ready list.
///
/// Iteration order is movie genres first, then TV genres; the first entry
/// seen for an id wins and later collisions are dropped. Output order is
/// insertion order, not alphabetical. When the two taxonomies name the same
/// id differently the TV name is therefore invisible; that mirrors how the
/// selector lists have always been populated.
pub fn merge_genres(movie: Vec<GenreEntry>, tv: Vec<GenreEntry>) -> Vec<GenreEntry> {
    let mut seen = HashSet::new();
    let mut merged = Vec::with_capacity(movie.len() + tv.len());
    for entry in movie.into_iter().chain(tv) {
        if seen.insert(entry.id) {
            merged.push(entry);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: i32, name: &str) -> GenreEntry {
        GenreEntry {
            id,
            name: name.to_string(),
        }
    }

    #[test]
    fn collision_keeps_first_seen_name() {
        let movie = vec![entry(1, "Action"), entry(2, "Drame")];
        let tv = vec![entry(2, "Drama"), entry(3, "Animation")];
        let merged = merge_genres(movie, tv);
        assert_eq!(
            merged,
            vec![entry(1, "Action"), entry(2, "Drame"), entry(3, "Animation")]
        );
    }

    #[test]
    fn ids_unique_after_merge() {
        let movie = vec![entry(5, "Comedy"), entry(6, "Horror")];
        let tv = vec![entry(6, "Horreur"), entry(5, "Comédie"), entry(7, "News")];
        let merged = merge_genres(movie, tv);
        let ids: Vec<i32> = merged.iter().map(|g| g.id).collect();
        assert_eq!(ids, vec![5, 6, 7]);
    }

    #[test]
    fn empty_inputs_yield_empty_list() {
        assert!(merge_genres(Vec::new(), Vec::new()).is_empty());
    }

    #[test]
    fn single_taxonomy_passes_through() {
        let tv = vec![entry(10, "Reality"), entry(11, "Soap")];
        assert_eq!(merge_genres(Vec::new(), tv.clone()), tv);
    }
}
