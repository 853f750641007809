mod crawl;
mod search;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite, SqliteConnection};

use crate::{
    metadata::{Credits, MovieMetadata},
    movie::{CastMember, Director, MetadataStatus, Movie, MovieDetail, NewMovie},
    Error, Result,
};

const INIT_SQL: &str = r"
CREATE TABLE IF NOT EXISTS movies (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    year INTEGER,
    file_url TEXT NOT NULL UNIQUE,
    directory_url TEXT,
    poster_url TEXT,
    popularity REAL,
    vote_count INTEGER,
    vote_average REAL,
    tmdb_id INTEGER,
    fetched INTEGER NOT NULL DEFAULT 0,
    metadata_status TEXT NOT NULL DEFAULT 'missing',
    last_crawled_at TEXT,
    remote_modified_at TEXT,
    next_crawl_at TEXT,
    last_refreshed_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_movies_title ON movies(title);
CREATE INDEX IF NOT EXISTS idx_movies_year ON movies(year);
CREATE INDEX IF NOT EXISTS idx_movies_popularity ON movies(popularity);
CREATE INDEX IF NOT EXISTS idx_movies_rating ON movies(vote_average);
CREATE INDEX IF NOT EXISTS idx_movies_status ON movies(metadata_status);
CREATE INDEX IF NOT EXISTS idx_movies_tmdb ON movies(tmdb_id);

CREATE TABLE IF NOT EXISTS genres (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE COLLATE NOCASE
);

CREATE TABLE IF NOT EXISTS movie_genres (
    movie_id INTEGER NOT NULL REFERENCES movies(id) ON DELETE CASCADE,
    genre_id INTEGER NOT NULL REFERENCES genres(id) ON DELETE CASCADE,
    PRIMARY KEY (movie_id, genre_id)
);

CREATE INDEX IF NOT EXISTS idx_movie_genres_genre ON movie_genres(genre_id);

CREATE TABLE IF NOT EXISTS movie_details (
    movie_id INTEGER PRIMARY KEY REFERENCES movies(id) ON DELETE CASCADE,
    overview TEXT NOT NULL DEFAULT '',
    runtime INTEGER,
    release_date TEXT,
    backdrop_url TEXT,
    tagline TEXT NOT NULL DEFAULT '',
    imdb_id TEXT,
    original_language TEXT,
    budget INTEGER,
    revenue INTEGER,
    production_companies TEXT NOT NULL DEFAULT '[]',
    cast_json TEXT NOT NULL DEFAULT '[]',
    director_json TEXT,
    credits_fetched_at TEXT,
    fetched_at TEXT
);

CREATE TABLE IF NOT EXISTS crawl_sources (
    base_url TEXT PRIMARY KEY,
    last_crawled_at TEXT
);

CREATE TABLE IF NOT EXISTS crawled_directories (
    url TEXT PRIMARY KEY,
    remote_modified_at TEXT,
    last_crawled_at TEXT NOT NULL,
    movie_count INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS failed_parses (
    url TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    reason TEXT NOT NULL,
    raw_text TEXT NOT NULL DEFAULT '',
    error_message TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    retry_count INTEGER NOT NULL DEFAULT 0
);
";

/// Movie columns plus the genre names joined with the unit separator.
const MOVIE_SELECT: &str = r"
SELECT m.id, m.title, m.year, m.file_url, m.directory_url, m.poster_url, m.popularity,
       m.vote_count, m.vote_average, m.tmdb_id, m.fetched, m.metadata_status,
       m.last_crawled_at, m.remote_modified_at, m.next_crawl_at, m.last_refreshed_at,
       m.updated_at,
       (SELECT group_concat(g.name, char(31))
          FROM movie_genres mg JOIN genres g ON g.id = mg.genre_id
         WHERE mg.movie_id = m.id) AS genres
FROM movies m";

const GENRE_SEPARATOR: char = '\u{1f}';

/// Collection-wide counters for the stats endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionStats {
    pub movies: i64,
    pub with_metadata: i64,
    pub missing: i64,
    pub failed: i64,
    pub genres: i64,
    pub year_min: Option<i32>,
    pub year_max: Option<i32>,
}

pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn open(path: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&format!("sqlite:{path}?mode=rwc"))
            .await?;

        sqlx::query(INIT_SQL).execute(&pool).await?;

        Ok(Self { pool })
    }

    pub async fn open_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        sqlx::query(INIT_SQL).execute(&pool).await?;

        Ok(Self { pool })
    }

    #[cfg(test)]
    pub(crate) const fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    // Movie operations

    /// Insert the movie unless its file URL is already known.
    ///
    /// Returns the stored row and whether it was created by this call.
    pub async fn upsert_movie(&self, movie: &NewMovie) -> Result<(Movie, bool)> {
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            r"
            INSERT INTO movies (title, year, file_url, directory_url, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(file_url) DO NOTHING
            ",
        )
        .bind(&movie.title)
        .bind(movie.year)
        .bind(&movie.file_url)
        .bind(&movie.directory_url)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let stored = self.get_movie_by_url(&movie.file_url).await?;
        Ok((stored, result.rows_affected() == 1))
    }

    pub async fn get_movie(&self, id: i64) -> Result<Movie> {
        let row: MovieRow = sqlx::query_as(&format!("{MOVIE_SELECT} WHERE m.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(Error::MovieNotFound(id))?;

        row.try_into()
    }

    pub async fn get_movie_by_url(&self, file_url: &str) -> Result<Movie> {
        let row: MovieRow = sqlx::query_as(&format!("{MOVIE_SELECT} WHERE m.file_url = ?"))
            .bind(file_url)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::Validation(format!("no movie with file URL {file_url}")))?;

        row.try_into()
    }

    pub async fn count_movies(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM movies")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Store a successful match: stats, genres and detail fields.
    ///
    /// Values the provider left empty keep whatever was stored before.
    pub async fn apply_metadata(
        &self,
        id: i64,
        meta: &MovieMetadata,
        remote_modified: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r"
            UPDATE movies
            SET tmdb_id = ?,
                poster_url = COALESCE(?, poster_url),
                popularity = COALESCE(?, popularity),
                vote_count = COALESCE(?, vote_count),
                vote_average = COALESCE(?, vote_average),
                fetched = 1,
                metadata_status = 'ok',
                next_crawl_at = NULL,
                last_crawled_at = ?,
                remote_modified_at = COALESCE(?, remote_modified_at),
                updated_at = ?
            WHERE id = ?
            ",
        )
        .bind(meta.tmdb_id)
        .bind(&meta.poster_url)
        .bind(meta.popularity)
        .bind(meta.vote_count)
        .bind(meta.vote_average)
        .bind(&now)
        .bind(remote_modified.map(|t| t.to_rfc3339()))
        .bind(&now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::MovieNotFound(id));
        }

        if !meta.genres.is_empty() {
            replace_genres(&mut tx, id, &meta.genres).await?;
        }
        merge_detail(&mut tx, id, meta).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Store a poster found by the fallback source when no full match exists.
    pub async fn apply_poster(
        &self,
        id: i64,
        poster_url: &str,
        remote_modified: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            r"
            UPDATE movies
            SET poster_url = ?,
                fetched = 1,
                metadata_status = 'ok',
                next_crawl_at = NULL,
                last_crawled_at = ?,
                remote_modified_at = COALESCE(?, remote_modified_at),
                updated_at = ?
            WHERE id = ?
            ",
        )
        .bind(poster_url)
        .bind(&now)
        .bind(remote_modified.map(|t| t.to_rfc3339()))
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::MovieNotFound(id));
        }
        Ok(())
    }

    /// Record a failed or empty lookup and schedule the next attempt.
    pub async fn schedule_retry(
        &self,
        id: i64,
        status: MetadataStatus,
        retry_in: Duration,
        remote_modified: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r"
            UPDATE movies
            SET metadata_status = ?,
                next_crawl_at = ?,
                last_crawled_at = ?,
                remote_modified_at = COALESCE(?, remote_modified_at),
                updated_at = ?
            WHERE id = ?
            ",
        )
        .bind(status.as_str())
        .bind((now + retry_in).to_rfc3339())
        .bind(now.to_rfc3339())
        .bind(remote_modified.map(|t| t.to_rfc3339()))
        .bind(now.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::MovieNotFound(id));
        }
        Ok(())
    }

    /// Overwrite the popularity figures from a refresh.
    pub async fn update_stats(&self, id: i64, meta: &MovieMetadata) -> Result<()> {
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            r"
            UPDATE movies
            SET popularity = COALESCE(?, popularity),
                vote_count = COALESCE(?, vote_count),
                vote_average = COALESCE(?, vote_average),
                tmdb_id = COALESCE(tmdb_id, ?),
                last_refreshed_at = ?,
                updated_at = ?
            WHERE id = ?
            ",
        )
        .bind(meta.popularity)
        .bind(meta.vote_count)
        .bind(meta.vote_average)
        .bind(meta.tmdb_id)
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::MovieNotFound(id));
        }
        Ok(())
    }

    /// Movies with status `missing` or `failed`, by title.
    pub async fn missing_metadata(&self) -> Result<Vec<Movie>> {
        let rows: Vec<MovieRow> = sqlx::query_as(&format!(
            "{MOVIE_SELECT} WHERE m.metadata_status IN ('missing', 'failed') \
             ORDER BY m.title COLLATE NOCASE, m.id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Movie::try_from).collect()
    }

    /// Movies to refresh: those with a TMDB id, or every movie when `all`.
    pub async fn refresh_candidates(&self, all: bool, limit: Option<usize>) -> Result<Vec<Movie>> {
        let rows: Vec<MovieRow> = sqlx::query_as(&format!(
            "{MOVIE_SELECT} WHERE (? OR m.tmdb_id IS NOT NULL) ORDER BY m.id LIMIT ?"
        ))
        .bind(all)
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Movie::try_from).collect()
    }

    /// Movies with a TMDB id, restricted to those never given credits unless `all`.
    pub async fn credits_candidates(&self, all: bool, limit: Option<usize>) -> Result<Vec<Movie>> {
        let rows: Vec<MovieRow> = sqlx::query_as(&format!(
            r"{MOVIE_SELECT}
            WHERE m.tmdb_id IS NOT NULL
              AND (? OR NOT EXISTS (
                    SELECT 1 FROM movie_details d
                    WHERE d.movie_id = m.id AND d.credits_fetched_at IS NOT NULL))
            ORDER BY m.id LIMIT ?"
        ))
        .bind(all)
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Movie::try_from).collect()
    }

    // Genres

    /// Genre names attached to at least one movie, alphabetically.
    pub async fn list_genres(&self) -> Result<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar(
            r"
            SELECT g.name FROM genres g
            WHERE EXISTS (SELECT 1 FROM movie_genres mg WHERE mg.genre_id = g.id)
            ORDER BY g.name COLLATE NOCASE
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(names)
    }

    pub async fn set_genres(&self, movie_id: i64, genres: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        replace_genres(&mut tx, movie_id, genres).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn collection_stats(&self) -> Result<CollectionStats> {
        let (movies, with_metadata, missing, failed, year_min, year_max): (
            i64,
            i64,
            i64,
            i64,
            Option<i32>,
            Option<i32>,
        ) = sqlx::query_as(
            r"
            SELECT COUNT(*),
                   COALESCE(SUM(metadata_status = 'ok'), 0),
                   COALESCE(SUM(metadata_status = 'missing'), 0),
                   COALESCE(SUM(metadata_status = 'failed'), 0),
                   MIN(year),
                   MAX(year)
            FROM movies
            ",
        )
        .fetch_one(&self.pool)
        .await?;

        let genres: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT genre_id) FROM movie_genres")
            .fetch_one(&self.pool)
            .await?;

        Ok(CollectionStats {
            movies,
            with_metadata,
            missing,
            failed,
            genres,
            year_min,
            year_max,
        })
    }

    // Details

    pub async fn get_detail(&self, movie_id: i64) -> Result<Option<MovieDetail>> {
        let row: Option<DetailRow> = sqlx::query_as(
            r"
            SELECT overview, runtime, release_date, backdrop_url, tagline, imdb_id,
                   original_language, budget, revenue, production_companies, cast_json,
                   director_json, credits_fetched_at, fetched_at
            FROM movie_details WHERE movie_id = ?
            ",
        )
        .bind(movie_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(MovieDetail::try_from).transpose()
    }

    /// Merge detail fields without touching stats, status or credits.
    pub async fn save_detail(&self, movie_id: i64, meta: &MovieMetadata) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        if !meta.genres.is_empty() {
            replace_genres(&mut tx, movie_id, &meta.genres).await?;
        }
        merge_detail(&mut tx, movie_id, meta).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn save_credits(&self, movie_id: i64, credits: &Credits) -> Result<()> {
        let cast_json = serde_json::to_string(&credits.cast)?;
        let director_json = credits
            .director
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r"
            INSERT INTO movie_details (movie_id, cast_json, director_json, credits_fetched_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(movie_id) DO UPDATE SET
                cast_json = excluded.cast_json,
                director_json = excluded.director_json,
                credits_fetched_at = excluded.credits_fetched_at
            ",
        )
        .bind(movie_id)
        .bind(cast_json)
        .bind(director_json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

async fn replace_genres(conn: &mut SqliteConnection, movie_id: i64, genres: &[String]) -> Result<()> {
    sqlx::query("DELETE FROM movie_genres WHERE movie_id = ?")
        .bind(movie_id)
        .execute(&mut *conn)
        .await?;

    for name in genres.iter().map(|g| g.trim()).filter(|g| !g.is_empty()) {
        sqlx::query("INSERT INTO genres (name) VALUES (?) ON CONFLICT(name) DO NOTHING")
            .bind(name)
            .execute(&mut *conn)
            .await?;

        sqlx::query(
            r"
            INSERT OR IGNORE INTO movie_genres (movie_id, genre_id)
            SELECT ?, id FROM genres WHERE name = ?
            ",
        )
        .bind(movie_id)
        .bind(name)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

async fn merge_detail(conn: &mut SqliteConnection, movie_id: i64, meta: &MovieMetadata) -> Result<()> {
    let companies = serde_json::to_string(&meta.production_companies)?;

    sqlx::query(
        r"
        INSERT INTO movie_details (
            movie_id, overview, runtime, release_date, backdrop_url, tagline, imdb_id,
            original_language, budget, revenue, production_companies, fetched_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(movie_id) DO UPDATE SET
            overview = CASE WHEN excluded.overview != '' THEN excluded.overview ELSE overview END,
            runtime = COALESCE(excluded.runtime, runtime),
            release_date = COALESCE(excluded.release_date, release_date),
            backdrop_url = COALESCE(excluded.backdrop_url, backdrop_url),
            tagline = CASE WHEN excluded.tagline != '' THEN excluded.tagline ELSE tagline END,
            imdb_id = COALESCE(excluded.imdb_id, imdb_id),
            original_language = COALESCE(excluded.original_language, original_language),
            budget = COALESCE(excluded.budget, budget),
            revenue = COALESCE(excluded.revenue, revenue),
            production_companies = CASE WHEN excluded.production_companies != '[]'
                THEN excluded.production_companies ELSE production_companies END,
            fetched_at = excluded.fetched_at
        ",
    )
    .bind(movie_id)
    .bind(&meta.overview)
    .bind(meta.runtime)
    .bind(meta.release_date.map(|d| d.format("%Y-%m-%d").to_string()))
    .bind(&meta.backdrop_url)
    .bind(&meta.tagline)
    .bind(&meta.imdb_id)
    .bind(&meta.original_language)
    .bind(meta.budget)
    .bind(meta.revenue)
    .bind(companies)
    .bind(Utc::now().to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// SQLite treats a negative LIMIT as unbounded.
fn sql_limit(limit: Option<usize>) -> i64 {
    limit.map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX))
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Parse(format!("bad timestamp {value}: {e}")))
}

fn parse_opt_timestamp(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value.as_deref().map(parse_timestamp).transpose()
}

#[derive(sqlx::FromRow)]
struct MovieRow {
    id: i64,
    title: String,
    year: Option<i32>,
    file_url: String,
    directory_url: Option<String>,
    poster_url: Option<String>,
    popularity: Option<f64>,
    vote_count: Option<i64>,
    vote_average: Option<f64>,
    tmdb_id: Option<i64>,
    fetched: bool,
    metadata_status: String,
    last_crawled_at: Option<String>,
    remote_modified_at: Option<String>,
    next_crawl_at: Option<String>,
    last_refreshed_at: Option<String>,
    updated_at: String,
    genres: Option<String>,
}

impl TryFrom<MovieRow> for Movie {
    type Error = Error;

    fn try_from(row: MovieRow) -> Result<Self> {
        let mut genres: Vec<String> = row
            .genres
            .map(|g| g.split(GENRE_SEPARATOR).map(str::to_string).collect())
            .unwrap_or_default();
        genres.sort_by_key(|g| g.to_lowercase());

        Ok(Self {
            id: row.id,
            title: row.title,
            year: row.year,
            file_url: row.file_url,
            directory_url: row.directory_url,
            poster_url: row.poster_url,
            popularity: row.popularity,
            vote_count: row.vote_count,
            vote_average: row.vote_average,
            tmdb_id: row.tmdb_id,
            fetched: row.fetched,
            metadata_status: row.metadata_status.parse()?,
            genres,
            last_crawled_at: parse_opt_timestamp(row.last_crawled_at)?,
            remote_modified_at: parse_opt_timestamp(row.remote_modified_at)?,
            next_crawl_at: parse_opt_timestamp(row.next_crawl_at)?,
            last_refreshed_at: parse_opt_timestamp(row.last_refreshed_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct DetailRow {
    overview: String,
    runtime: Option<i64>,
    release_date: Option<String>,
    backdrop_url: Option<String>,
    tagline: String,
    imdb_id: Option<String>,
    original_language: Option<String>,
    budget: Option<i64>,
    revenue: Option<i64>,
    production_companies: String,
    cast_json: String,
    director_json: Option<String>,
    credits_fetched_at: Option<String>,
    fetched_at: Option<String>,
}

impl TryFrom<DetailRow> for MovieDetail {
    type Error = Error;

    fn try_from(row: DetailRow) -> Result<Self> {
        let release_date = row
            .release_date
            .as_deref()
            .map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d"))
            .transpose()
            .map_err(|e| Error::Parse(format!("bad release date: {e}")))?;
        let cast: Vec<CastMember> = serde_json::from_str(&row.cast_json)?;
        let director: Option<Director> = row
            .director_json
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;

        Ok(Self {
            overview: row.overview,
            runtime: row.runtime,
            release_date,
            backdrop_url: row.backdrop_url,
            tagline: row.tagline,
            imdb_id: row.imdb_id,
            original_language: row.original_language,
            budget: row.budget,
            revenue: row.revenue,
            production_companies: serde_json::from_str(&row.production_companies)?,
            cast,
            director,
            credits_fetched_at: parse_opt_timestamp(row.credits_fetched_at)?,
            fetched_at: parse_opt_timestamp(row.fetched_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(super) fn new_movie(title: &str, year: Option<i32>) -> NewMovie {
        NewMovie {
            title: title.to_string(),
            year,
            file_url: format!("http://nas.local/movies/{title}.mkv"),
            directory_url: None,
        }
    }

    pub(super) fn metadata(tmdb_id: i64, rating: f64, genres: &[&str]) -> MovieMetadata {
        MovieMetadata {
            tmdb_id,
            title: String::new(),
            genres: genres.iter().map(|g| (*g).to_string()).collect(),
            popularity: Some(rating * 10.0),
            vote_count: Some(1000),
            vote_average: Some(rating),
            poster_url: Some(format!("https://image.tmdb.org/t/p/w500/{tmdb_id}.jpg")),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let storage = Storage::open_memory().await.unwrap();
        let movie = new_movie("Inception", Some(2010));

        let (first, created) = storage.upsert_movie(&movie).await.unwrap();
        assert!(created);
        assert_eq!(first.title, "Inception");
        assert_eq!(first.metadata_status, MetadataStatus::Missing);
        assert!(!first.fetched);

        let (second, created) = storage.upsert_movie(&movie).await.unwrap();
        assert!(!created);
        assert_eq!(second.id, first.id);
        assert_eq!(storage.count_movies().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_get_missing_movie() {
        let storage = Storage::open_memory().await.unwrap();
        let err = storage.get_movie(42).await.unwrap_err();
        assert!(matches!(err, Error::MovieNotFound(42)));
    }

    #[tokio::test]
    async fn test_apply_metadata_keeps_existing_values() {
        let storage = Storage::open_memory().await.unwrap();
        let (movie, _) = storage.upsert_movie(&new_movie("Heat", Some(1995))).await.unwrap();

        let mut meta = metadata(949, 8.3, &["Crime", "Drama"]);
        meta.overview = "Obsessive cop vs. master thief.".into();
        storage.apply_metadata(movie.id, &meta, None).await.unwrap();

        let stored = storage.get_movie(movie.id).await.unwrap();
        assert_eq!(stored.metadata_status, MetadataStatus::Ok);
        assert!(stored.fetched);
        assert_eq!(stored.tmdb_id, Some(949));
        assert_eq!(stored.genres, vec!["Crime", "Drama"]);

        // A sparser second match keeps the poster and overview.
        let sparse = MovieMetadata {
            tmdb_id: 949,
            vote_average: Some(8.4),
            ..Default::default()
        };
        storage.apply_metadata(movie.id, &sparse, None).await.unwrap();

        let stored = storage.get_movie(movie.id).await.unwrap();
        assert_eq!(stored.vote_average, Some(8.4));
        assert!(stored.poster_url.is_some());
        assert_eq!(stored.genres.len(), 2);
        let detail = storage.get_detail(movie.id).await.unwrap().unwrap();
        assert_eq!(detail.overview, "Obsessive cop vs. master thief.");
    }

    #[tokio::test]
    async fn test_schedule_retry() {
        let storage = Storage::open_memory().await.unwrap();
        let (movie, _) = storage.upsert_movie(&new_movie("Obscure", None)).await.unwrap();

        storage
            .schedule_retry(movie.id, MetadataStatus::Failed, Duration::hours(6), None)
            .await
            .unwrap();

        let stored = storage.get_movie(movie.id).await.unwrap();
        assert_eq!(stored.metadata_status, MetadataStatus::Failed);
        assert!(stored.is_scheduled_after(Utc::now() + Duration::hours(5)));
        assert!(stored.last_crawled_at.is_some());

        let missing = storage.missing_metadata().await.unwrap();
        assert_eq!(missing.len(), 1);
    }

    #[tokio::test]
    async fn test_candidates_and_limit() {
        let storage = Storage::open_memory().await.unwrap();
        for (i, title) in ["A", "B", "C"].iter().enumerate() {
            let (movie, _) = storage.upsert_movie(&new_movie(title, None)).await.unwrap();
            if i < 2 {
                storage
                    .apply_metadata(movie.id, &metadata(i as i64 + 1, 7.0, &[]), None)
                    .await
                    .unwrap();
            }
        }

        assert_eq!(storage.refresh_candidates(false, None).await.unwrap().len(), 2);
        assert_eq!(storage.refresh_candidates(true, None).await.unwrap().len(), 3);
        assert_eq!(storage.refresh_candidates(true, Some(1)).await.unwrap().len(), 1);

        let first = storage.credits_candidates(false, None).await.unwrap();
        assert_eq!(first.len(), 2);

        storage
            .save_credits(
                first[0].id,
                &Credits {
                    cast: vec![CastMember {
                        name: "Someone".into(),
                        character: "Lead".into(),
                        profile_url: None,
                    }],
                    director: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(storage.credits_candidates(false, None).await.unwrap().len(), 1);
        assert_eq!(storage.credits_candidates(true, None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_credits_roundtrip_keeps_details() {
        let storage = Storage::open_memory().await.unwrap();
        let (movie, _) = storage.upsert_movie(&new_movie("Alien", Some(1979))).await.unwrap();

        let mut meta = metadata(348, 8.1, &["Horror"]);
        meta.runtime = Some(117);
        meta.release_date = NaiveDate::from_ymd_opt(1979, 5, 25);
        storage.apply_metadata(movie.id, &meta, None).await.unwrap();

        let credits = Credits {
            cast: vec![CastMember {
                name: "Sigourney Weaver".into(),
                character: "Ripley".into(),
                profile_url: None,
            }],
            director: Some(Director {
                name: "Ridley Scott".into(),
                profile_url: None,
            }),
        };
        storage.save_credits(movie.id, &credits).await.unwrap();

        let detail = storage.get_detail(movie.id).await.unwrap().unwrap();
        assert_eq!(detail.runtime, Some(117));
        assert_eq!(detail.release_date, NaiveDate::from_ymd_opt(1979, 5, 25));
        assert_eq!(detail.cast, credits.cast);
        assert_eq!(detail.director, credits.director);
    }

    #[tokio::test]
    async fn test_genres_and_stats() {
        let storage = Storage::open_memory().await.unwrap();
        let (a, _) = storage.upsert_movie(&new_movie("A", Some(1999))).await.unwrap();
        let (b, _) = storage.upsert_movie(&new_movie("B", Some(2015))).await.unwrap();
        storage.upsert_movie(&new_movie("C", None)).await.unwrap();

        storage
            .set_genres(a.id, &["Drama".into(), "Action".into()])
            .await
            .unwrap();
        // Same genre with different case shares one row.
        storage.set_genres(b.id, &["drama".into()]).await.unwrap();

        assert_eq!(storage.list_genres().await.unwrap(), vec!["Action", "Drama"]);

        let stats = storage.collection_stats().await.unwrap();
        assert_eq!(stats.movies, 3);
        assert_eq!(stats.missing, 3);
        assert_eq!(stats.genres, 2);
        assert_eq!((stats.year_min, stats.year_max), (Some(1999), Some(2015)));
    }
}
