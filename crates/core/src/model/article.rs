use serde::{Deserialize, Deserializer, Serialize};

pub const NEWS_SOURCE: &str = "DEV.to";

/// Article as returned by the DEV.to `/api/articles` listing. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamArticle {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub published_at: Option<String>,
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub user: Option<UpstreamUser>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamUser {
    pub name: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Article {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub published_at: Option<String>,
    pub tags: Vec<String>,
    pub user: ArticleUser,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArticleUser {
    pub name: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsResponse {
    pub source: String,
    pub tag: String,
    pub count: usize,
    pub articles: Vec<Article>,
}

impl NewsResponse {
    pub fn new(tag: String, articles: Vec<Article>) -> Self {
        Self {
            source: NEWS_SOURCE.to_string(),
            tag,
            count: articles.len(),
            articles,
        }
    }
}

impl From<UpstreamArticle> for Article {
    fn from(value: UpstreamArticle) -> Self {
        let user = value.user.unwrap_or_default();
        Self {
            id: value.id,
            title: value.title,
            url: value.url,
            description: value.description,
            published_at: value.published_at,
            tags: value.tags,
            user: ArticleUser {
                name: user.name,
                username: user.username,
            },
        }
    }
}

// DEV.to sends `tags` as a comma separated string on listings and as an array elsewhere.
fn deserialize_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Tags {
        List(Vec<String>),
        Joined(String),
    }

    Ok(match Option::<Tags>::deserialize(deserializer)? {
        Some(Tags::List(list)) => list,
        Some(Tags::Joined(joined)) => joined
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        None => Vec::new(),
    })
}
