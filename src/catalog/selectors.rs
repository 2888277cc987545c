//! カタログページのCSSセレクタ

/// 「Все фильтры」
pub const ALL_FILTERS: &str = ".dropdown-filter.j-show-all-filtres";

/// 価格ドロップダウン（マウスオーバーで入力欄が出る）
pub const PRICE_DROPDOWN: &str = ".dropdown-filter__btn.dropdown-filter__btn--priceU";
pub const PRICE_START: &str = "input.j-price[name=\"startN\"]";
pub const PRICE_END: &str = "input.j-price[name=\"endN\"]";
pub const NOT_FOUND: &str = ".not-found-result";
pub const NOT_FOUND_TEXT: &str = "не нашлось подходящих товаров";

pub const BRAND_FILTER: &str = ".filters-desktop__item.j-filter-container.filters-desktop__item--type-6.filters-desktop__item--fbrand.open.show";
pub const BRAND_SHOW_ALL: &str = ".filters-desktop__item.j-filter-container.filters-desktop__item--type-6.filters-desktop__item--fbrand.open.show .filter__show-all.j-show-whole-filters";
pub const BRAND_SEARCH: &str = ".filters-desktop__item.j-filter-container.filters-desktop__item--type-6.filters-desktop__item--fbrand.open.show .j-search-filter";
pub const BRAND_LIST: &str = ".filters-desktop__item.j-filter-container.filters-desktop__item--type-6.filters-desktop__item--fbrand.open.show .filter__list";
pub const BRAND_CHECKBOX: &str = ".filters-desktop__item.j-filter-container.filters-desktop__item--type-6.filters-desktop__item--fbrand.open.show .checkbox-with-text__decor";

pub const DIAGONAL_FILTER: &str = ".filters-desktop__item.j-filter-container.filters-desktop__item--type-1.filters-desktop__item--f92740.open.show";
pub const DIAGONAL_ITEMS: &str = ".filters-desktop__item.j-filter-container.filters-desktop__item--type-1.filters-desktop__item--f92740.open.show .filter__list .filter__item";
pub const DIAGONAL_CHECKBOXES: &str = ".filters-desktop__item.j-filter-container.filters-desktop__item--type-1.filters-desktop__item--f92740.open.show .filter__list .filter__item .checkbox-with-text__decor";

/// 「Показать」
pub const APPLY: &str = ".filters-desktop__btn-main.btn-main";

pub const PRODUCT_CARD: &str = "article.product-card";
pub const PRODUCT_LINK: &str = "article.product-card a.j-card-link";
pub const NEXT_PAGE: &str = ".pagination-next.pagination__next.j-next-page";
