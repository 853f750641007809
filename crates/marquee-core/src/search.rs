//! Search filters as received over HTTP and their validated form.

use serde::{Deserialize, Serialize};

use crate::movie::MovieSummary;

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GenreMode {
    /// At least one of the requested genres.
    #[default]
    Any,
    /// Every requested genre.
    All,
}

impl GenreMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::All => "all",
        }
    }
}

impl std::str::FromStr for GenreMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "any" => Ok(Self::Any),
            "all" => Ok(Self::All),
            _ => Err(crate::Error::Validation(format!("unknown genre_mode: {s}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SortField {
    #[default]
    PopularityDesc,
    PopularityAsc,
    RatingDesc,
    RatingAsc,
    VotesDesc,
    YearAsc,
    YearDesc,
    TitleAsc,
    TitleDesc,
}

impl SortField {
    /// The query-string spelling.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PopularityDesc => "popularity",
            Self::PopularityAsc => "-popularity",
            Self::RatingDesc => "rating",
            Self::RatingAsc => "-rating",
            Self::VotesDesc => "votes",
            Self::YearAsc => "year",
            Self::YearDesc => "-year",
            Self::TitleAsc => "title",
            Self::TitleDesc => "-title",
        }
    }

    /// Column and direction (`true` for descending).
    pub const fn column(&self) -> (&'static str, bool) {
        match self {
            Self::PopularityDesc => ("popularity", true),
            Self::PopularityAsc => ("popularity", false),
            Self::RatingDesc => ("vote_average", true),
            Self::RatingAsc => ("vote_average", false),
            Self::VotesDesc => ("vote_count", true),
            Self::YearAsc => ("year", false),
            Self::YearDesc => ("year", true),
            Self::TitleAsc => ("title", false),
            Self::TitleDesc => ("title", true),
        }
    }
}

impl std::str::FromStr for SortField {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "popularity" => Ok(Self::PopularityDesc),
            "-popularity" => Ok(Self::PopularityAsc),
            "rating" => Ok(Self::RatingDesc),
            "-rating" => Ok(Self::RatingAsc),
            "votes" => Ok(Self::VotesDesc),
            "year" => Ok(Self::YearAsc),
            "-year" => Ok(Self::YearDesc),
            "title" => Ok(Self::TitleAsc),
            "-title" => Ok(Self::TitleDesc),
            _ => Err(crate::Error::Validation(format!("unknown sort: {s}"))),
        }
    }
}

/// Query parameters exactly as received; nothing here is trusted yet.
///
/// Every key may repeat. Scalar filters use the last value given.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    pub q: Vec<String>,
    pub year_min: Vec<String>,
    pub year_max: Vec<String>,
    pub rating_min: Vec<String>,
    #[serde(rename = "genre[]")]
    pub genre_list: Vec<String>,
    pub genre: Vec<String>,
    pub genre_mode: Vec<String>,
    pub sort: Vec<String>,
    pub page: Vec<String>,
    pub per_page: Vec<String>,
}

/// Validated search filters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub year_min: Option<i32>,
    pub year_max: Option<i32>,
    pub rating_min: Option<f64>,
    /// Lowercased and deduplicated.
    pub genres: Vec<String>,
    pub genre_mode: GenreMode,
    pub sort: SortField,
    pub page: u32,
    pub per_page: u32,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            q: None,
            year_min: None,
            year_max: None,
            rating_min: None,
            genres: Vec::new(),
            genre_mode: GenreMode::Any,
            sort: SortField::PopularityDesc,
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl SearchQuery {
    /// Validate raw parameters field by field.
    ///
    /// Malformed values fall back to their defaults and are described in the
    /// returned warnings instead of failing the whole request.
    pub fn from_params(params: &SearchParams) -> (Self, Vec<String>) {
        let mut warnings = Vec::new();
        let mut query = Self {
            q: present(last(&params.q)).map(str::to_string),
            ..Self::default()
        };

        query.year_min = parse_field(last(&params.year_min), "year_min", &mut warnings);
        query.year_max = parse_field(last(&params.year_max), "year_max", &mut warnings);
        if let (Some(lo), Some(hi)) = (query.year_min, query.year_max) {
            if lo > hi {
                query.year_min = Some(hi);
                query.year_max = Some(lo);
            }
        }

        let rating_min = parse_field::<f64>(last(&params.rating_min), "rating_min", &mut warnings);
        query.rating_min = rating_min.and_then(|r| {
            if r.is_finite() && (0.0..=10.0).contains(&r) {
                Some(r)
            } else {
                warnings.push(format!("rating_min out of range 0-10: {r}"));
                None
            }
        });

        for name in params.genre_list.iter().chain(&params.genre) {
            let name = name.trim().to_lowercase();
            if !name.is_empty() && !query.genres.contains(&name) {
                query.genres.push(name);
            }
        }

        if let Some(mode) = parse_field(last(&params.genre_mode), "genre_mode", &mut warnings) {
            query.genre_mode = mode;
        }
        if let Some(sort) = parse_field(last(&params.sort), "sort", &mut warnings) {
            query.sort = sort;
        }

        match parse_field::<u32>(last(&params.page), "page", &mut warnings) {
            Some(0) => warnings.push("page must be at least 1".to_string()),
            Some(page) => query.page = page,
            None => {}
        }
        match parse_field::<u32>(last(&params.per_page), "per_page", &mut warnings) {
            Some(n) if (1..=MAX_PER_PAGE).contains(&n) => query.per_page = n,
            Some(n) => warnings.push(format!("per_page must be 1-{MAX_PER_PAGE}: {n}")),
            None => {}
        }

        (query, warnings)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.per_page)
    }
}

fn last(values: &[String]) -> Option<&str> {
    values.last().map(String::as_str)
}

fn present(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_field<T>(raw: Option<&str>, name: &str, warnings: &mut Vec<String>) -> Option<T>
where
    T: std::str::FromStr,
{
    let raw = present(raw)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warnings.push(format!("ignoring invalid {name}: {raw}"));
            None
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPage {
    pub items: Vec<MovieSummary>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u64,
}

impl SearchPage {
    pub fn new(items: Vec<MovieSummary>, total: u64, query: &SearchQuery) -> Self {
        Self {
            items,
            total,
            page: query.page,
            per_page: query.per_page,
            total_pages: total.div_ceil(u64::from(query.per_page)),
        }
    }
}
