use sqlx::{QueryBuilder, Sqlite};

use super::{MovieRow, Storage, MOVIE_SELECT};
use crate::movie::{Movie, MovieSummary};
use crate::search::{GenreMode, SearchPage, SearchQuery};
use crate::Result;

impl Storage {
    /// One page of movies matching `query`.
    ///
    /// Pages past the end come back empty rather than as an error.
    pub async fn search(&self, query: &SearchQuery) -> Result<SearchPage> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM movies m");
        push_filters(&mut count, query);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;
        let total = u64::try_from(total).unwrap_or(0);

        if query.offset() >= total {
            return Ok(SearchPage::new(Vec::new(), total, query));
        }

        let mut select = QueryBuilder::<Sqlite>::new(MOVIE_SELECT);
        push_filters(&mut select, query);

        let (column, desc) = query.sort.column();
        let direction = if desc { "DESC" } else { "ASC" };
        let collate = if column == "title" { " COLLATE NOCASE" } else { "" };
        // Nulls sort last in both directions; id keeps pages stable.
        select.push(format!(
            " ORDER BY (m.{column} IS NULL), m.{column}{collate} {direction}, m.id ASC"
        ));
        select.push(" LIMIT ");
        select.push_bind(i64::from(query.per_page));
        select.push(" OFFSET ");
        select.push_bind(i64::try_from(query.offset()).unwrap_or(i64::MAX));

        let rows: Vec<MovieRow> = select.build_query_as().fetch_all(&self.pool).await?;
        let items = rows
            .into_iter()
            .map(|row| Movie::try_from(row).map(MovieSummary::from))
            .collect::<Result<Vec<_>>>()?;

        Ok(SearchPage::new(items, total, query))
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, query: &SearchQuery) {
    qb.push(" WHERE 1 = 1");

    if let Some(q) = &query.q {
        let pattern = format!("%{}%", escape_like(q));
        qb.push(" AND (m.title LIKE ")
            .push_bind(pattern.clone())
            .push(r" ESCAPE '\' OR CAST(m.year AS TEXT) LIKE ")
            .push_bind(pattern)
            .push(r" ESCAPE '\')");
    }
    if let Some(lo) = query.year_min {
        qb.push(" AND m.year >= ").push_bind(lo);
    }
    if let Some(hi) = query.year_max {
        qb.push(" AND m.year <= ").push_bind(hi);
    }
    if let Some(rating) = query.rating_min {
        qb.push(" AND m.vote_average >= ").push_bind(rating);
    }

    if !query.genres.is_empty() {
        let genre_match = " FROM movie_genres mg JOIN genres g ON g.id = mg.genre_id \
                           WHERE mg.movie_id = m.id AND lower(g.name) IN (";
        match query.genre_mode {
            GenreMode::Any => {
                qb.push(" AND EXISTS (SELECT 1").push(genre_match);
            }
            GenreMode::All => {
                qb.push(" AND (SELECT COUNT(DISTINCT lower(g.name))").push(genre_match);
            }
        }

        let mut names = qb.separated(", ");
        for genre in &query.genres {
            names.push_bind(genre.clone());
        }
        names.push_unseparated("))");

        if query.genre_mode == GenreMode::All {
            qb.push(" = ")
                .push_bind(i64::try_from(query.genres.len()).unwrap_or(i64::MAX));
        }
    }
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::super::tests::{metadata, new_movie};
    use super::*;
    use crate::search::{SearchParams, SortField};

    async fn seeded() -> Storage {
        let storage = Storage::open_memory().await.unwrap();
        let catalog: [(&str, Option<i32>, Option<f64>, &[&str]); 5] = [
            ("Inception", Some(2010), Some(8.4), &["Action", "Science Fiction"]),
            ("Heat", Some(1995), Some(8.3), &["Crime", "Drama"]),
            ("The Room", Some(2003), Some(3.6), &["Drama"]),
            ("Alien", Some(1979), Some(8.1), &["Horror", "Science Fiction"]),
            ("Untitled 100%", None, None, &[]),
        ];

        for (i, (title, year, rating, genres)) in catalog.iter().enumerate() {
            let (movie, _) = storage.upsert_movie(&new_movie(title, *year)).await.unwrap();
            if let Some(rating) = rating {
                storage
                    .apply_metadata(movie.id, &metadata(i as i64 + 1, *rating, genres), None)
                    .await
                    .unwrap();
            }
        }
        storage
    }

    fn titles(page: &SearchPage) -> Vec<&str> {
        page.items.iter().map(|m| m.title.as_str()).collect()
    }

    #[tokio::test]
    async fn test_default_sort_is_popularity_nulls_last() {
        let storage = seeded().await;
        let page = storage.search(&SearchQuery::default()).await.unwrap();

        assert_eq!(page.total, 5);
        assert_eq!(
            titles(&page),
            vec!["Inception", "Heat", "Alien", "The Room", "Untitled 100%"]
        );
    }

    #[tokio::test]
    async fn test_rating_min_is_a_floor() {
        let storage = seeded().await;
        let query = SearchQuery {
            rating_min: Some(8.2),
            ..Default::default()
        };
        let page = storage.search(&query).await.unwrap();

        assert_eq!(page.total, 2);
        assert!(page.items.iter().all(|m| m.vote_average.unwrap() >= 8.2));
    }

    #[tokio::test]
    async fn test_text_matches_title_or_year() {
        let storage = seeded().await;

        let by_title = SearchQuery {
            q: Some("ALIEN".into()),
            ..Default::default()
        };
        assert_eq!(titles(&storage.search(&by_title).await.unwrap()), vec!["Alien"]);

        let by_year = SearchQuery {
            q: Some("199".into()),
            ..Default::default()
        };
        assert_eq!(titles(&storage.search(&by_year).await.unwrap()), vec!["Heat"]);

        // Wildcards in the query are literal.
        let literal = SearchQuery {
            q: Some("100%".into()),
            ..Default::default()
        };
        assert_eq!(
            titles(&storage.search(&literal).await.unwrap()),
            vec!["Untitled 100%"]
        );
    }

    #[tokio::test]
    async fn test_genre_modes() {
        let storage = seeded().await;
        let (any, _) = SearchQuery::from_params(&SearchParams {
            genre_list: vec!["drama".into(), "horror".into()],
            sort: vec!["title".into()],
            ..Default::default()
        });
        assert_eq!(
            titles(&storage.search(&any).await.unwrap()),
            vec!["Alien", "Heat", "The Room"]
        );

        let all = SearchQuery {
            genres: vec!["science fiction".into(), "horror".into()],
            genre_mode: GenreMode::All,
            ..Default::default()
        };
        assert_eq!(titles(&storage.search(&all).await.unwrap()), vec!["Alien"]);
    }

    #[tokio::test]
    async fn test_year_range_and_sort() {
        let storage = seeded().await;
        let query = SearchQuery {
            year_min: Some(1990),
            year_max: Some(2005),
            sort: SortField::YearDesc,
            ..Default::default()
        };
        assert_eq!(
            titles(&storage.search(&query).await.unwrap()),
            vec!["The Room", "Heat"]
        );
    }

    #[tokio::test]
    async fn test_no_matches_is_empty_page() {
        let storage = seeded().await;
        let query = SearchQuery {
            rating_min: Some(9.9),
            ..Default::default()
        };
        let page = storage.search(&query).await.unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 0);
        assert_eq!(page.total_pages, 0);
    }

    #[tokio::test]
    async fn test_second_page_of_twenty_five() {
        let storage = Storage::open_memory().await.unwrap();
        for i in 0..25 {
            storage
                .upsert_movie(&new_movie(&format!("Movie {i:02}"), Some(2000)))
                .await
                .unwrap();
        }

        let query = SearchQuery {
            page: 2,
            per_page: 20,
            sort: SortField::TitleAsc,
            ..Default::default()
        };
        let page = storage.search(&query).await.unwrap();
        assert_eq!(page.items.len(), 5);
        assert_eq!(page.items[0].title, "Movie 20");
        assert_eq!(page.total, 25);
        assert_eq!(page.total_pages, 2);

        let past_end = SearchQuery { page: 3, ..query };
        let page = storage.search(&past_end).await.unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 25);
    }
}
