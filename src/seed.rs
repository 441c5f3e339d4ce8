//! Synthetic movie documents for building comparison datasets.

use bson::{doc, Document};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::error::{MarqueeError, Result};
use crate::store::DocumentStore;

pub const MOVIE_GENRES: &[&str] = &[
    "Action",
    "Adventure",
    "Animation",
    "Biography",
    "Comedy",
    "Crime",
    "Documentary",
    "Drama",
    "Family",
    "Fantasy",
    "Film-Noir",
    "History",
    "Horror",
    "Music",
    "Musical",
    "Mystery",
    "Romance",
    "Sci-Fi",
    "Sport",
    "Thriller",
    "War",
    "Western",
];

const TITLE_WORDS: &[&str] = &[
    "night", "river", "empire", "silent", "last", "golden", "city", "storm", "shadow", "return",
    "broken", "summer", "iron", "lost", "heart", "road", "winter", "machine", "wild", "kingdom",
];

#[derive(Debug, Clone)]
pub struct SeedOptions {
    pub count: usize,
    pub batch_size: usize,
    pub seed: u64,
}

impl Default for SeedOptions {
    fn default() -> Self {
        Self {
            count: 5000,
            batch_size: 1000,
            seed: 42,
        }
    }
}

/// One random movie: 2 to 6 word title, year in 1950..=2024, 1 to 4
/// distinct genres, IMDb rating in 1.0..=10.0 with one decimal.
pub fn random_movie(rng: &mut impl Rng) -> Document {
    let words = rng.gen_range(2..=6);
    let title: Vec<&str> = (0..words)
        .filter_map(|_| TITLE_WORDS.choose(&mut *rng).copied())
        .collect();
    let genre_count = rng.gen_range(1..=4);
    let genres: Vec<&str> = MOVIE_GENRES
        .choose_multiple(&mut *rng, genre_count)
        .copied()
        .collect();
    let rating = (rng.gen_range(10..=100_u32) as f64) / 10.0;

    doc! {
        "title": title.join(" "),
        "year": rng.gen_range(1950..=2024_i32),
        "genres": genres,
        "imdb": { "rating": rating },
    }
}

/// Insert `options.count` random movies into `collection`, in batches.
/// Deterministic for a given seed. Returns the number inserted.
pub async fn seed_movies(
    store: &dyn DocumentStore,
    collection: &str,
    options: &SeedOptions,
) -> Result<usize> {
    if options.batch_size == 0 {
        return Err(MarqueeError::Validation("batch size must be >= 1".into()));
    }

    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut inserted = 0;
    while inserted < options.count {
        let n = options.batch_size.min(options.count - inserted);
        let batch: Vec<Document> = (0..n).map(|_| random_movie(&mut rng)).collect();
        store.insert_many(collection, batch).await?;
        inserted += n;
        info!(collection, inserted, total = options.count, "inserted movie batch");
    }

    Ok(inserted)
}
