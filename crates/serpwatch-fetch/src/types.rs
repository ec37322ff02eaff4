/// One outbound search request.
#[derive(Debug, Clone)]
pub struct SerpRequest {
    pub term: String,
    /// Country/locale code, e.g. `us`, `de`.
    pub locale: String,
    /// How many results to request (the extractor scans at most 100).
    pub result_count: u32,
    /// Optional geo bias, e.g. a city name for localized results.
    pub geo: Option<String>,
}

/// Raw markup returned by a successful fetch.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    pub html: String,
}
