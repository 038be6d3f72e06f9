use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SampleArticle {
    pub name: &'static str,
    pub text: &'static str,
}

pub static SAMPLE_ARTICLES: [SampleArticle; 4] = [
    SampleArticle {
        name: "Positive News",
        text: "Stocks soared to new heights today as investors cheered strong earnings reports and \
               positive economic data. The Dow Jones Industrial Average jumped 300 points, while \
               the S&P 500 and Nasdaq Composite also recorded significant gains.",
    },
    SampleArticle {
        name: "Neutral News",
        text: "The Federal Reserve announced today that it would hold interest rates steady, \
               citing moderate economic growth and stable inflation. The central bank will \
               continue to monitor economic conditions and is prepared to adjust policy as needed.",
    },
    SampleArticle {
        name: "Negative News",
        text: "Market plunged sharply today amid concerns over rising inflation and potential \
               interest rate hikes. The Dow Jones Industrial Average tumbled 500 points, with \
               technology stocks leading the decline. Investors are worried about the impact of \
               higher rates on corporate earnings.",
    },
    SampleArticle {
        name: "Mixed News",
        text: "Economic data released today painted a mixed picture of the economy. While the \
               unemployment rate fell to a new low, inflation remained stubbornly high. Analysts \
               are divided on whether the Federal Reserve will need to take more aggressive \
               action to combat inflation.",
    },
];

pub fn find_sample(name: &str) -> Option<&'static SampleArticle> {
    SAMPLE_ARTICLES
        .iter()
        .find(|sample| sample.name.eq_ignore_ascii_case(name.trim()))
}
