//! End-to-end check of the sampling pipeline's pure half: rendered page
//! source through the markup reader, then per-date slot evaluation.

use slot_watcher_core::evaluator::{has_open_slot, MissingRegion};
use watcher_lib::adapters::markup;

/// A trimmed-down rendition of the slot-selection page: one date with open
/// slots, one date with the "nothing available" alert, one date fully
/// booked. Attended slots exist on the page but never count.
const SLOT_PAGE: &str = r#"
<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>Reserve a Time Slot</title>
  <script>window.ue_t0 = +new Date();</script>
</head>
<body>
  <div id="slot-selection-root" class="a-section">
    <div id="slot-container-2024-01-02" class="ufss-date-container">
      <div id="slot-container-ATTENDED">
        <div id="root-2024-01-02-ATTENDED-box-group" class="a-box-group">
          <div class="ufss-slot-box"><input type="radio" name="slot"></div>
        </div>
      </div>
      <div id="slot-container-UNATTENDED">
        <div id="root-2024-01-02-UNATTENDED-box-group" class="a-box-group">
          <div class="ufss-slot-box"><input type="radio" name="slot"><span>8 AM - 10 AM</span></div>
          <div class="ufss-slot-box disabledRadioBox"><span>10 AM - 12 PM</span></div>
          <div class="ufss-slot-box"><input type="radio" name="slot"><span>12 PM - 2 PM</span></div>
          <div class="ufss-slot-box disabledRadioBox"><span>2 PM - 4 PM</span></div>
        </div>
      </div>
    </div>
    <div id="slot-container-2024-01-03" class="ufss-date-container">
      <div id="slot-container-UNATTENDED">
        <div class="a-box a-alert a-alert-info">
          <div class="a-alert-container"><h4 class="a-alert-heading">Not available</h4></div>
        </div>
        <div id="root-2024-01-03-UNATTENDED-box-group" class="a-box-group"></div>
      </div>
    </div>
    <div id="slot-container-2024-01-04" class="ufss-date-container">
      <div id="slot-container-UNATTENDED">
        <div id="root-2024-01-04-UNATTENDED-box-group" class="a-box-group">
          <div class="ufss-slot-box disabledRadioBox"><span>8 AM - 10 AM</span></div>
          <div class="ufss-slot-box disabledRadioBox"><span>10 AM - 12 PM</span></div>
        </div>
      </div>
    </div>
  </div>
</body>
</html>
"#;

#[test]
fn realistic_page_reports_only_open_dates() {
    let snapshot = markup::parse(SLOT_PAGE);

    assert_eq!(has_open_slot(&snapshot, "2024-01-02"), Ok(true));
    assert_eq!(has_open_slot(&snapshot, "2024-01-03"), Ok(false));
    assert_eq!(has_open_slot(&snapshot, "2024-01-04"), Ok(false));
    // A date the page does not render at all is simply not available.
    assert_eq!(has_open_slot(&snapshot, "2024-01-09"), Ok(false));
}

#[test]
fn format_drift_is_flagged_loudly() {
    // The date container exists, but the unattended region the page always
    // carried is gone.
    let drifted = markup::parse(
        r#"<div id="slot-container-2024-01-02" class="ufss-date-container">
             <div id="slot-panel-UNATTENDED"></div>
           </div>"#,
    );

    let err = has_open_slot(&drifted, "2024-01-02").unwrap_err();
    assert_eq!(err.date, "2024-01-02");
    assert_eq!(err.region, MissingRegion::Unattended);
}
