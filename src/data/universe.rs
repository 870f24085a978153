//! The scan universe: default watchlist, sector ETF membership, index proxy.
//!
//! The watchlist is a fixed table of several hundred liquid US equities
//! grouped loosely by theme. Sector membership maps each symbol to the sector
//! ETF whose rotation state feeds the sector score.

use super::Bar;

/// Broad-market proxy used for relative strength and market condition.
pub const SPY: &str = "SPY";

/// Default watchlist scanned every evening.
pub const DEFAULT_WATCHLIST: &[&str] = &[
    "AAPL", "MSFT", "NVDA", "AMD", "GOOGL", "META", "AMZN", "TSLA",
    "AVGO", "MU", "SMCI", "ARM", "MRVL", "INTC", "QCOM", "AMAT",
    "LRCX", "KLAC", "MPWR", "ONTO", "CRUS", "SWKS", "WOLF", "AMBA",
    "NXPI", "ADI", "MCHP", "ON", "STX", "WDC", "ASML", "TSM",
    "NVMI", "ACLS", "FORM", "UCTT", "MKSI", "CAMT", "RMBS", "SITM",
    "PLTR", "CRM", "SNOW", "DDOG", "NET", "CRWD", "NOW", "ZS",
    "OKTA", "TWLO", "MDB", "BILL", "PATH", "AI", "GTLB", "S",
    "HUBS", "TEAM", "CFLT", "ESTC", "RPD", "TENB", "FORG", "VEEV",
    "DOCU", "DOCN", "APPN", "MNDY", "WIX", "SMAR", "PCTY", "PAYC",
    "COUP", "AZPN", "ANGI", "BOX", "SPSC", "ADBE", "ORCL", "INTU",
    "WDAY", "ADSK", "ANSS", "CDNS", "PTC", "MANH", "PEGA", "NCNO",
    "FRSH", "BRZE", "JAMF", "TOST", "EVCM", "FTNT", "PANW", "CYBR",
    "CHKP", "AKAM", "GLOB", "EPAM", "IONQ", "QUBT", "RGTI", "QBTS",
    "SOUN", "BBAI", "ARQQ", "LAES", "AIXI", "GFAI", "PRCT", "GENI",
    "COIN", "HOOD", "PYPL", "AFRM", "UPST", "SOFI", "MQ", "FOUR",
    "GPN", "FIS", "FLYW", "LC", "OPEN", "RELY", "DAVE", "PAYO",
    "V", "MA", "AXP", "SQ", "FISV", "WU", "DLO", "STNE",
    "XP", "RPAY", "UWMC", "COOP", "NUVEI", "SHOP", "SPOT", "RBLX",
    "SNAP", "PINS", "UBER", "LYFT", "ABNB", "DASH", "ZM", "ROKU",
    "NFLX", "BMBL", "MTCH", "DUOL", "APP", "DKNG", "PENN", "CPNG",
    "CART", "MELI", "SE", "GRAB", "RIVN", "LCID", "NIO", "XPEV",
    "LI", "CHPT", "PLUG", "ENPH", "SEDG", "ARRY", "NOVA", "RUN",
    "BLNK", "EVGO", "BE", "FCEL", "SPWR", "STEM", "NKLA", "FSLR",
    "MAXN", "CSIQ", "DAQO", "SHLS", "FLUX", "PTRA", "MSTR", "MARA",
    "RIOT", "CLSK", "CIFR", "HUT", "WULF", "IREN", "BTBT", "CORZ",
    "BABA", "JD", "PDD", "BIDU", "FUTU", "TIGR", "NTES", "EDU",
    "TAL", "NIU", "VNET", "TUYA", "MRNA", "BNTX", "CRSP", "BEAM",
    "PACB", "ILMN", "HIMS", "TDOC", "NVAX", "ALNY", "IONS", "FATE",
    "EDIT", "NTLA", "INCY", "EXAS", "NTRA", "ACCD", "GDRX", "BMRN",
    "SGEN", "RXRX", "VERV", "TWST", "ALLO", "RCKT", "IMVT", "KYMR",
    "ARWR", "VRTX", "REGN", "BIIB", "GILD", "ACAD", "FOLD", "ARDX",
    "PTGX", "PRAX", "NKTR", "IGMS", "KRTX", "TARS", "APLS", "DNLI",
    "ROIV", "IMCR", "KRYS", "RARE", "VKTX", "RYTM", "ACLX", "CGEM",
    "SNDX", "ABBV", "LLY", "PFE", "JNJ", "BMY", "MRK", "AZN",
    "BA", "RKLB", "ASTS", "LUNR", "MNTS", "LMT", "RTX", "NOC",
    "GD", "KTOS", "HII", "TDG", "LDOS", "SAIC", "BAH", "CACI",
    "HEICO", "TDY", "SPR", "JPM", "BAC", "GS", "MS", "SCHW",
    "IBKR", "C", "WFC", "BLK", "USB", "PNC", "TFC", "COF",
    "KEY", "RF", "ZION", "CFG", "HBAN", "MTB", "WMT", "TGT",
    "COST", "ETSY", "W", "CHWY", "CVNA", "KSS", "M", "JWN",
    "GPS", "ONON", "BIRK", "ELF", "CELH", "LULU", "NKE", "UAA",
    "HD", "LOW", "BBY", "DKS", "FIVE", "OLLI", "BJ", "SFM",
    "ULTA", "BOOT", "CROX", "DECK", "SKX", "WING", "CAVA", "MCD",
    "SBUX", "CMG", "YUM", "QSR", "WEN", "JACK", "TXRH", "DINE",
    "EAT", "DRI", "BLMN", "SHAK", "CAKE", "PLAY", "TMO", "DHR",
    "MDT", "BSX", "EW", "ISRG", "DXCM", "PODD", "IRTC", "NVCR",
    "SWAV", "INMD", "SILK", "MMSI", "LMAT", "ATRC", "UNH", "CVS",
    "CI", "HUM", "CNC", "MOH", "DOCS", "WELL", "XOM", "CVX",
    "OXY", "DVN", "HAL", "SLB", "MRO", "FANG", "COP", "BKR",
    "NEE", "AES", "ETR", "EXC", "PCG", "SRE", "SO", "FCX",
    "NEM", "GOLD", "AG", "WPM", "PAAS", "EXK", "HL", "AA",
    "CLF", "X", "NUE", "STLD", "RS", "DAL", "UAL", "AAL",
    "LUV", "EXPE", "BKNG", "MAR", "DIS", "WBD", "PARA", "FUBO",
    "CAT", "DE", "EMR", "HON", "MMM", "GE", "ETN", "ROK",
    "ITW", "CARR", "OTIS", "XYL", "ROP", "VRSK", "CPRT", "GNRC",
    "ODFL", "SAIA", "GME", "AMC", "SPCE", "CLOV", "WKHS", "TLRY",
    "SNDL", "ACB", "CRON", "ARKK", "SOXL", "TQQQ", "UVXY", "LABD",
    "SQQQ", "TNA", "TZA", "SPXU", "UPRO", "TECL", "TECS", "FNGU",
    "FNGD", "AMT", "CCI", "EQIX", "DLR", "VICI", "O", "PLD",
    "SPG", "EQR", "AVB", "ESS", "MAA", "OHI", "SBRA", "IBM",
    "SAP", "ACN", "TXN", "HPQ", "DELL", "WEX", "GDDY", "ZI",
    "TTD", "MGNI", "PUBM", "LMND", "ROOT", "JOBY", "ACHR",];

/// Sector ETF membership. A symbol absent from every list has no sector
/// signal and scores sector-neutral.
pub static SECTOR_ETFS: &[(&str, &[&str])] = &[
    ("XLK", &[
        "AAPL", "MSFT", "NVDA", "AMD", "GOOGL", "META", "CRM", "TWLO", "DDOG", "NET",
        "CRWD", "OKTA", "SNOW", "SHOP", "INTC", "QCOM", "AVGO", "NOW", "ZS", "PLTR",
        "AI", "ARM", "SMCI", "AMAT", "HUBS", "TEAM", "MDB", "BILL", "DOCU", "PAYC",
        "ADBE", "ORCL", "INTU", "WDAY", "PANW", "FTNT", "CYBR",
    ]),
    ("XLF", &[
        "COIN", "HOOD", "PYPL", "AFRM", "UPST", "SOFI", "MQ", "FOUR", "GPN", "FIS",
        "JPM", "BAC", "GS", "MS", "SCHW", "IBKR", "C", "WFC", "BLK", "V",
        "MA", "AXP", "SQ", "FISV", "USB", "PNC", "TFC", "COF",
    ]),
    ("XLY", &[
        "AMZN", "TSLA", "ABNB", "DASH", "UBER", "LYFT", "RBLX", "SHOP", "ETSY", "W",
        "CHWY", "CVNA", "BMBL", "MTCH", "DKNG", "PENN", "MELI", "SE", "ONON", "CELH",
        "LULU", "NKE", "HD", "LOW", "MCD", "SBUX", "CMG", "CAVA", "WING",
    ]),
    ("XLC", &[
        "GOOGL", "META", "NFLX", "SNAP", "SPOT", "ROKU", "ZM", "PINS", "DIS", "WBD",
        "PARA", "DUOL", "APP",
    ]),
    ("XME", &[
        "MARA", "RIOT", "CLSK", "CIFR", "HUT", "WULF", "IREN", "BTBT", "CORZ", "FCX",
        "NEM", "GOLD", "AG", "WPM", "PAAS", "AA", "CLF", "NUE", "STLD",
    ]),
    ("XBI", &[
        "MRNA", "BNTX", "CRSP", "BEAM", "NVAX", "ALNY", "IONS", "HIMS", "TDOC", "ILMN",
        "PACB", "INCY", "EXAS", "NTRA", "GDRX", "BMRN", "SGEN", "RXRX", "VRTX", "REGN",
        "BIIB", "GILD", "ABBV", "LLY", "PFE", "MRK", "ACAD", "APLS", "KRTX", "VKTX",
    ]),
    ("XLI", &[
        "RIVN", "LCID", "NIO", "XPEV", "LI", "CHPT", "PLUG", "ENPH", "BLNK", "EVGO",
        "BE", "RKLB", "ASTS", "LUNR", "BA", "LMT", "RTX", "NOC", "HAL", "SLB",
        "JOBY", "ACHR", "CAT", "DE", "GE", "HON", "ODFL", "SAIA",
    ]),
    ("XLE", &[
        "XOM", "CVX", "OXY", "DVN", "SLB", "HAL", "MRO", "FANG", "COP", "BKR",
        "NEE", "FSLR", "ENPH",
    ]),];

/// Find the sector ETF a symbol belongs to, if any.
pub fn sector_etf_for(symbol: &str) -> Option<&'static str> {
    SECTOR_ETFS
        .iter()
        .find(|(_, members)| members.contains(&symbol))
        .map(|(etf, _)| *etf)
}

/// Roll daily bars up into weekly bars by ISO week.
///
/// Used as the default weekly series for providers without a native weekly
/// endpoint. The weekly close is the last daily close of the week; volume is
/// summed; open/high/low aggregate across the week.
pub fn rollup_weekly(daily: &[Bar]) -> Vec<Bar> {
    use chrono::Datelike;

    let mut weeks: Vec<Bar> = Vec::new();
    let mut current_week: Option<(i32, u32)> = None;

    for bar in daily {
        let iso = bar.date().iso_week();
        let key = (iso.year(), iso.week());
        if current_week == Some(key) {
            if let Some(last) = weeks.last_mut() {
                last.high = last.high.max(bar.high);
                last.low = last.low.min(bar.low);
                last.close = bar.close;
                last.volume += bar.volume;
            }
        } else {
            weeks.push(bar.clone());
            current_week = Some(key);
        }
    }
    weeks
}
