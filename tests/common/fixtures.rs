use bson::{doc, Document};

const OTHER_GENRES: [&str; 4] = ["Drama", "Comedy", "Horror", "Western"];

/// `total` movie documents of which exactly `matching` have "Action" in
/// `genres` and `year >= 2010`.
///
/// Non-matching movies alternate between Action titles from before 2010
/// and recent titles in other genres, so neither key alone selects them.
pub fn movies(total: usize, matching: usize) -> Vec<Document> {
    assert!(matching <= total, "cannot match more movies than exist");

    (0..total)
        .map(|i| {
            let other = OTHER_GENRES[i % OTHER_GENRES.len()];
            let recent = 2010 + (i % 15) as i32;
            let old = 1950 + (i % 60) as i32;
            if i < matching {
                doc! {
                    "title": format!("Match {i}"),
                    "year": recent,
                    "genres": ["Action", other],
                    "imdb": { "rating": 7.5 },
                }
            } else if i % 2 == 0 {
                doc! {
                    "title": format!("Old action {i}"),
                    "year": old,
                    "genres": ["Action"],
                    "imdb": { "rating": 6.0 },
                }
            } else {
                doc! {
                    "title": format!("Recent {i}"),
                    "year": recent,
                    "genres": [other],
                    "imdb": { "rating": 5.0 },
                }
            }
        })
        .collect()
}
