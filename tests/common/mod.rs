//! Saved-page fixtures shared by the integration tests
#![allow(dead_code)]

use review_harvester_lib::infrastructure::config::CrawlerConfig;
use review_harvester_lib::infrastructure::extraction::selectors::CURRENT;
use review_harvester_lib::infrastructure::session::SiteSnapshot;

pub fn review_node(nick: &str, rating: &str) -> String {
    format!(
        r#"<li>
          <div class="info"><div class="user">
            <p class="info_user"><a class="id" onclick="javascript:common.link.moveReviewerProfile('{nick}Q==');">{nick}</a></p>
            <p class="tag"><span>지성</span><span>여름쿨톤</span></p>
            <div class="badge"><a class="point_flag">TOP 1000</a></div>
          </div></div>
          <div class="review_cont">
            <div class="score_area">
              <span class="review_point"><span class="point">5점만점에 {rating}</span></span>
              <span class="date">2024.06.01</span>
            </div>
            <p class="item_option">[옵션] 본품 50ml</p>
            <div class="poll_sample">
              <dl class="poll_type1"><dt><span>피부타입</span></dt><dd><span>지성에 좋아요</span></dd></dl>
              <dl class="poll_type1"><dt><span>피부고민</span></dt><dd><span>진정에 좋아요</span></dd></dl>
            </div>
            <div class="txt_inner">{nick} 님의 리뷰입니다</div>
            <div class="recom_area"><button><span class="num">1</span></button></div>
          </div>
        </li>"#
    )
}

/// One state of a product page with the given review page shown
pub fn product_page(review_count: u32, reviews: &[String], page_links: u32) -> String {
    let pageing: String = (1..=page_links)
        .map(|n| format!(r#"<a data-page-no="{n}">{n}</a>"#))
        .collect();
    format!(
        r#"<html><body><div id="Contents">
          <div class="left_area"><div class="prd_social_info">
            <p id="repReview"><b>4.6</b><em>({review_count}건)</em></p>
          </div></div>
          <div class="right_area"><div class="prd_info">
            <p class="prd_brand">아누아</p>
            <p class="prd_name">어성초 77 수딩 토너</p>
            <p class="prd_flag"><span class="icon_flag">세일</span><span class="icon_flag">오늘드림</span></p>
          </div></div>
          <ul class="prd_detail_tab"><li id="buyInfo">구매정보</li><li id="reviewInfo">리뷰</li></ul>
          <div id="artcInfo">
            <dl class="detail_info_list"><dt>상품정보 제공고시</dt><dd>-</dd></dl>
            <dl class="detail_info_list"><dt>화장품법에 따라 기재해야 하는 모든 성분</dt><dd>어성초추출물, 정제수, 1,2-헥산다이올</dd></dl>
          </div>
          <div class="review_wrap">
            <div class="review_list_wrap"><ul id="gdasList">{}</ul></div>
            <div class="pageing">{pageing}</div>
          </div>
        </div></body></html>"#,
        reviews.concat()
    )
}

/// A product with `review_count` reviews spread over pages of ten
pub fn product_site(prefix: &str, review_count: u32) -> SiteSnapshot {
    let per_page = 10;
    let pages = review_count / per_page + 1;
    let states = (0..pages)
        .map(|page| {
            let first = page * per_page;
            let last = review_count.min(first + per_page);
            let nodes: Vec<String> = (first..last)
                .map(|i| review_node(&format!("{prefix}{i}"), "5점"))
                .collect();
            product_page(review_count, &nodes, pages)
        })
        .collect();
    SiteSnapshot::paginated(states, |n| CURRENT.page_link(n))
}

/// Production settings with waits and pauses shrunk for static pages
pub fn fast_crawler() -> CrawlerConfig {
    CrawlerConfig {
        wait_timeout_ms: 200,
        container_timeout_ms: 200,
        tab_click_timeout_ms: 200,
        page_click_timeout_ms: 200,
        poll_interval_ms: 50,
        settle_interval_ms: 20,
        cooldown_ms: 20,
        product_info_cooldown_ms: 20,
        ..CrawlerConfig::default()
    }
}
