use livepoll::error::AppResult;

fn main() -> AppResult<()> {
    livepoll::entry::run()
}
