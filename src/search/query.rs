//! Search-store query and template construction

use serde_json::{json, Value};

use crate::schemas::SearchRequest;

/// Index template applied to `{pattern}-*`
pub fn index_template(pattern: &str, embedding_dims: usize) -> Value {
    json!({
        "index_patterns": [format!("{}-*", pattern)],
        "template": {
            "settings": {
                "number_of_shards": 1,
                "number_of_replicas": 1,
                "analysis": {
                    "analyzer": {
                        "news_analyzer": {
                            "type": "custom",
                            "tokenizer": "standard",
                            "filter": ["lowercase", "stop", "snowball"]
                        }
                    }
                }
            },
            "mappings": {
                "properties": {
                    "id": {"type": "keyword"},
                    "url": {"type": "keyword"},
                    "title": {
                        "type": "text",
                        "analyzer": "news_analyzer",
                        "fields": {
                            "keyword": {"type": "keyword", "ignore_above": 256}
                        }
                    },
                    "text": {"type": "text", "analyzer": "news_analyzer"},
                    "summary": {"type": "text", "analyzer": "news_analyzer"},
                    "author": {"type": "keyword"},
                    "source": {"type": "keyword"},
                    "language": {"type": "keyword"},
                    "published_at": {"type": "date"},
                    "scraped_at": {"type": "date"},
                    "content_hash": {"type": "keyword"},
                    "word_count": {"type": "integer"},
                    "topics": {"type": "keyword"},
                    "entities": {"type": "keyword"},
                    "sentiment": {"type": "keyword"},
                    "sentiment_score": {"type": "float"},
                    "embeddings": {
                        "type": "dense_vector",
                        "dims": embedding_dims,
                        "index": true,
                        "similarity": "cosine"
                    },
                    "translated_title": {"type": "text", "analyzer": "news_analyzer"},
                    "translated_text": {"type": "text", "analyzer": "news_analyzer"},
                    "metadata": {"type": "object", "enabled": false}
                }
            }
        }
    })
}

/// Builds the bool query for a filtered search
pub fn search_query(request: &SearchRequest) -> Value {
    let mut must: Vec<Value> = Vec::new();
    let mut filter: Vec<Value> = Vec::new();

    if !request.query.is_empty() {
        must.push(json!({
            "multi_match": {
                "query": request.query,
                "fields": ["title^3", "summary^2", "text", "topics^2", "entities"],
                "type": "best_fields",
                "fuzziness": "AUTO"
            }
        }));
    }

    if let Some(ref topics) = request.topics {
        filter.push(json!({"terms": {"topics": topics}}));
    }
    if let Some(ref sources) = request.sources {
        filter.push(json!({"terms": {"source": sources}}));
    }
    if let Some(ref languages) = request.languages {
        filter.push(json!({"terms": {"language": languages}}));
    }
    if let Some(sentiment) = request.sentiment {
        filter.push(json!({"term": {"sentiment": sentiment.as_str()}}));
    }

    if request.date_from.is_some() || request.date_to.is_some() {
        let mut range = serde_json::Map::new();
        if let Some(from) = request.date_from {
            range.insert("gte".to_string(), json!(from.to_rfc3339()));
        }
        if let Some(to) = request.date_to {
            range.insert("lte".to_string(), json!(to.to_rfc3339()));
        }
        filter.push(json!({"range": {"published_at": range}}));
    }

    if must.is_empty() {
        must.push(json!({"match_all": {}}));
    }

    json!({"bool": {"must": must, "filter": filter}})
}

/// Full search body with pagination and newest-first sort
pub fn search_body(request: &SearchRequest) -> Value {
    json!({
        "query": search_query(request),
        "sort": [{"published_at": {"order": "desc"}}],
        "from": request.offset(),
        "size": request.size
    })
}

/// Body for the latest-N listing with optional source/language filters
pub fn latest_body(limit: usize, source: Option<&str>, language: Option<&str>) -> Value {
    let mut filter: Vec<Value> = Vec::new();
    if let Some(source) = source {
        filter.push(json!({"term": {"source": source}}));
    }
    if let Some(language) = language {
        filter.push(json!({"term": {"language": language}}));
    }

    let query = if filter.is_empty() {
        json!({"match_all": {}})
    } else {
        json!({"bool": {"must": [{"match_all": {}}], "filter": filter}})
    };

    json!({
        "query": query,
        "sort": [{"published_at": {"order": "desc"}}],
        "size": limit
    })
}

/// Aggregations body for the stats endpoint.
///
/// Sparse days are omitted rather than zero-filled (min_doc_count 1); the
/// histogram is newest-first and the caller truncates to seven days.
pub fn stats_body() -> Value {
    json!({
        "size": 0,
        "aggs": {
            "sources": {"terms": {"field": "source", "size": 20}},
            "languages": {"terms": {"field": "language", "size": 10}},
            "sentiments": {"terms": {"field": "sentiment", "size": 3}},
            "daily_counts": {
                "date_histogram": {
                    "field": "published_at",
                    "calendar_interval": "day",
                    "min_doc_count": 1,
                    "order": {"_key": "desc"}
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::Sentiment;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_empty_query_matches_all() {
        let request = SearchRequest {
            page: 1,
            size: 20,
            ..Default::default()
        };
        let query = search_query(&request);
        assert_eq!(query["bool"]["must"][0], json!({"match_all": {}}));
        assert_eq!(query["bool"]["filter"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_full_text_query_fields_and_boosts() {
        let request = SearchRequest {
            query: "quantum computing".to_string(),
            page: 1,
            size: 20,
            ..Default::default()
        };
        let query = search_query(&request);
        let multi_match = &query["bool"]["must"][0]["multi_match"];
        assert_eq!(multi_match["query"], "quantum computing");
        assert_eq!(
            multi_match["fields"],
            json!(["title^3", "summary^2", "text", "topics^2", "entities"])
        );
        assert_eq!(multi_match["type"], "best_fields");
        assert_eq!(multi_match["fuzziness"], "AUTO");
    }

    #[test]
    fn test_filters_compose() {
        let request = SearchRequest {
            sources: Some(vec!["A".to_string()]),
            sentiment: Some(Sentiment::Positive),
            date_from: Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()),
            page: 1,
            size: 10,
            ..Default::default()
        };
        let query = search_query(&request);
        let filters = query["bool"]["filter"].as_array().unwrap();
        assert_eq!(filters.len(), 3);
        assert_eq!(filters[0], json!({"terms": {"source": ["A"]}}));
        assert_eq!(filters[1], json!({"term": {"sentiment": "positive"}}));
        assert!(filters[2]["range"]["published_at"]["gte"].is_string());
    }

    #[test]
    fn test_search_body_sort_and_pagination() {
        let request = SearchRequest {
            page: 3,
            size: 25,
            ..Default::default()
        };
        let body = search_body(&request);
        assert_eq!(body["from"], 50);
        assert_eq!(body["size"], 25);
        assert_eq!(body["sort"][0]["published_at"]["order"], "desc");
    }

    #[test]
    fn test_template_shape() {
        let template = index_template("news", 768);
        assert_eq!(template["index_patterns"][0], "news-*");

        let props = &template["template"]["mappings"]["properties"];
        assert_eq!(props["embeddings"]["dims"], 768);
        assert_eq!(props["embeddings"]["similarity"], "cosine");
        assert_eq!(props["title"]["fields"]["keyword"]["ignore_above"], 256);
        assert_eq!(props["metadata"]["enabled"], false);
    }

    #[test]
    fn test_stats_body_omits_sparse_days() {
        let body = stats_body();
        let histogram = &body["aggs"]["daily_counts"]["date_histogram"];
        assert_eq!(histogram["min_doc_count"], 1);
        assert_eq!(histogram["order"]["_key"], "desc");
    }

    #[test]
    fn test_latest_body_filters() {
        let body = latest_body(10, Some("BBC"), None);
        assert_eq!(body["size"], 10);
        assert_eq!(
            body["query"]["bool"]["filter"][0],
            json!({"term": {"source": "BBC"}})
        );
    }
}
